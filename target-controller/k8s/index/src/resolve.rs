use crate::ports;
use auth_proxy_target_controller_core::{
    ReadSecret, ResolutionError, ResolveService, SecretRef, TargetPort, Url,
};
use auth_proxy_target_controller_k8s_api::{Api, Client, Secret, Service};

/// Resolves services and secrets by reading them from the cluster.
#[derive(Clone)]
pub struct KubeResolver {
    client: Client,
}

// === impl KubeResolver ===

impl KubeResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ResolveService for KubeResolver {
    async fn resolve_service_url(
        &self,
        namespace: &str,
        name: &str,
        port: Option<&TargetPort>,
    ) -> Result<Url, ResolutionError> {
        let api = Api::<Service>::namespaced(self.client.clone(), namespace);
        let service = api
            .get_opt(name)
            .await
            .map_err(|error| ResolutionError::Api {
                resource: format!("service {namespace}/{name}"),
                error: error.into(),
            })?
            .ok_or_else(|| ResolutionError::ServiceNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        ports::service_url(&service, port)
    }
}

#[async_trait::async_trait]
impl ReadSecret for KubeResolver {
    async fn read_secret(&self, secret: &SecretRef) -> Result<String, ResolutionError> {
        let api = Api::<Secret>::namespaced(self.client.clone(), &secret.namespace);
        let obj = api
            .get_opt(&secret.name)
            .await
            .map_err(|error| ResolutionError::Api {
                resource: format!("secret {secret}"),
                error: error.into(),
            })?
            .ok_or_else(|| ResolutionError::SecretNotFound(secret.clone()))?;
        secret_value(&obj, secret)
    }
}

/// Extracts the referenced value from a secret. Without a key, the secret must hold a single
/// data entry.
pub(crate) fn secret_value(obj: &Secret, secret: &SecretRef) -> Result<String, ResolutionError> {
    let data = obj.data.as_ref();
    let bytes = match secret.key.as_deref() {
        Some(key) => data
            .and_then(|data| data.get(key))
            .ok_or_else(|| ResolutionError::SecretKeyNotFound {
                secret: secret.clone(),
                key: key.to_string(),
            })?,
        None => {
            let mut values = data.into_iter().flat_map(|data| data.values());
            match (values.next(), values.next()) {
                (Some(value), None) => value,
                (None, _) => return Err(ResolutionError::SecretNotFound(secret.clone())),
                (Some(_), Some(_)) => {
                    return Err(ResolutionError::SecretKeyRequired(secret.clone()))
                }
            }
        }
    };
    String::from_utf8(bytes.0.clone()).map_err(|_| ResolutionError::SecretNotUtf8(secret.clone()))
}
