use auth_proxy_target_controller_core::{RawConditions, SecretRef, SourceId, TargetPort};
use auth_proxy_target_controller_k8s_api::Service;
use serde::Deserialize;

/// An unresolved target, as authored on a cluster object.
#[derive(Clone, Debug, PartialEq)]
pub struct RawTarget {
    pub key: String,
    pub source: SourceId,
    pub host: String,

    /// Unset when the author gave neither a URL nor a service. Compiling such a target fails.
    pub endpoint: Option<Endpoint>,
    pub target_port: Option<TargetPort>,
    pub ws_target_url: Option<String>,

    pub bearer_token: Option<String>,
    pub bearer_token_secret: Option<SecretRef>,
    pub basic_auth_username: Option<String>,
    pub basic_auth_password: Option<String>,
    pub basic_auth_password_secret: Option<SecretRef>,

    pub conditions: RawConditions,
}

/// Where a target's traffic goes.
#[derive(Clone, Debug, PartialEq)]
pub enum Endpoint {
    Url(String),
    ServiceName { namespace: String, name: String },
    Service(Box<Service>),
}

/// A secret reference as written in an annotation or a targets file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SecretSpec {
    namespace: Option<String>,
    secret_name: String,
    data_name: Option<String>,
}

// === impl RawTarget ===

impl RawTarget {
    pub fn new(key: impl ToString, source: SourceId, host: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            source,
            host: host.to_string(),
            endpoint: None,
            target_port: None,
            ws_target_url: None,
            bearer_token: None,
            bearer_token_secret: None,
            basic_auth_username: None,
            basic_auth_password: None,
            basic_auth_password_secret: None,
            conditions: RawConditions::default(),
        }
    }
}

// === impl SecretSpec ===

impl SecretSpec {
    /// Resolves the reference relative to the namespace of the object that holds it.
    pub(crate) fn into_ref(self, namespace: &str) -> SecretRef {
        SecretRef {
            namespace: self.namespace.unwrap_or_else(|| namespace.to_string()),
            name: self.secret_name,
            key: self.data_name,
        }
    }
}
