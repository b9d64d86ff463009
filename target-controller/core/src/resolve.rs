use serde::Deserialize;
use std::fmt;
use url::Url;

/// Selects a port on a service, by number or by name.
///
/// Names that look like numbers are matched against port numbers when no port has that name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum TargetPort {
    Number(u16),
    Name(String),
}

/// Points at a single value in a secret.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,

    /// The data entry to read. May be omitted when the secret has exactly one entry.
    pub key: Option<String>,
}

/// Resolves a service by name to the URL traffic should be forwarded to.
#[async_trait::async_trait]
pub trait ResolveService: Send + Sync {
    async fn resolve_service_url(
        &self,
        namespace: &str,
        name: &str,
        port: Option<&TargetPort>,
    ) -> Result<Url, ResolutionError>;
}

/// Reads a value from a secret.
#[async_trait::async_trait]
pub trait ReadSecret: Send + Sync {
    async fn read_secret(&self, secret: &SecretRef) -> Result<String, ResolutionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("need one of a target url or a service")]
    NoEndpoint,

    #[error("can't find target port {port} for service {namespace}/{service}")]
    PortNotFound {
        namespace: String,
        service: String,
        port: String,
    },

    #[error("can't find service {namespace}/{name}")]
    ServiceNotFound { namespace: String, name: String },

    #[error("can't find secret {0}")]
    SecretNotFound(SecretRef),

    #[error("secret {secret} has no data entry {key}")]
    SecretKeyNotFound { secret: SecretRef, key: String },

    #[error("secret {0} has more than one data entry; a key is required")]
    SecretKeyRequired(SecretRef),

    #[error("secret {0} does not hold UTF-8 text")]
    SecretNotUtf8(SecretRef),

    #[error("invalid url {url:?}: {error}")]
    InvalidUrl {
        url: String,
        #[source]
        error: url::ParseError,
    },

    #[error("failed to read {resource}: {error}")]
    Api {
        resource: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

// === impl TargetPort ===

impl fmt::Display for TargetPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(port) => write!(f, "{port}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

// === impl SecretRef ===

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)?;
        if let Some(key) = &self.key {
            write!(f, "[{key}]")?;
        }
        Ok(())
    }
}

// === impl ResolutionError ===

impl ResolutionError {
    pub fn invalid_url(url: impl Into<String>, error: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            error,
        }
    }
}
