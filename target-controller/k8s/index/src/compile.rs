use crate::{
    ports,
    raw::{Endpoint, RawTarget},
};
use auth_proxy_target_controller_core::{
    CompiledTarget, Condition, ReadSecret, ResolutionError, ResolveService, SecretRef, SourceId,
    Url,
};
use base64::{engine::general_purpose::STANDARD, Engine};

/// A single target could not be compiled. Other targets from the same source are unaffected.
#[derive(Debug, thiserror::Error)]
#[error("{source_id}: failed to compile target for {host}: {error}")]
pub struct TargetError {
    pub source_id: SourceId,
    pub key: String,
    pub host: String,
    #[source]
    pub error: ResolutionError,
}

/// Resolves a raw target into a routable target.
///
/// `defaults` are the conditions applied when the target doesn't specify its own.
pub async fn compile<R>(
    resolver: &R,
    raw: RawTarget,
    defaults: &[Condition],
) -> Result<CompiledTarget, TargetError>
where
    R: ResolveService + ReadSecret + ?Sized,
{
    match resolve(resolver, &raw, defaults).await {
        Ok(target) => Ok(target),
        Err(error) => Err(TargetError {
            source_id: raw.source,
            key: raw.key,
            host: raw.host,
            error,
        }),
    }
}

/// Derives a websocket URL from an HTTP URL, keeping its host, port, and path.
pub fn websocket_url(url: &Url) -> Url {
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return url.clone(),
    };
    let mut ws = url.clone();
    // Switching between special schemes always succeeds.
    let _ = ws.set_scheme(scheme);
    ws
}

async fn resolve<R>(
    resolver: &R,
    raw: &RawTarget,
    defaults: &[Condition],
) -> Result<CompiledTarget, ResolutionError>
where
    R: ResolveService + ReadSecret + ?Sized,
{
    let target_url = match &raw.endpoint {
        Some(Endpoint::Url(url)) => parse_url(url)?,
        Some(Endpoint::Service(service)) => ports::service_url(service, raw.target_port.as_ref())?,
        Some(Endpoint::ServiceName { namespace, name }) => {
            resolver
                .resolve_service_url(namespace, name, raw.target_port.as_ref())
                .await?
        }
        None => return Err(ResolutionError::NoEndpoint),
    };

    let ws_target_url = match raw.ws_target_url.as_deref() {
        Some(url) => parse_url(url)?,
        None => websocket_url(&target_url),
    };

    let mut target = CompiledTarget {
        key: raw.key.clone(),
        source: raw.source.clone(),
        target_url,
        ws_target_url,
        host: raw.host.clone(),
        conditions: raw.conditions.conditions(defaults),
        headers: None,
    };

    let bearer_token = secret_or_literal(
        resolver,
        raw.bearer_token.as_deref(),
        raw.bearer_token_secret.as_ref(),
    )
    .await?;
    if let Some(token) = bearer_token {
        target.add_header("authorization", format!("Bearer {token}"));
    }

    if let Some(username) = raw.basic_auth_username.as_deref().filter(|u| !u.is_empty()) {
        let password = secret_or_literal(
            resolver,
            raw.basic_auth_password.as_deref(),
            raw.basic_auth_password_secret.as_ref(),
        )
        .await?;
        if let Some(password) = password {
            let credentials = STANDARD.encode(format!("{username}:{password}"));
            target.add_header("authorization", format!("Basic {credentials}"));
        }
    }

    Ok(target)
}

/// A literal value takes precedence over a secret.
async fn secret_or_literal<R>(
    resolver: &R,
    literal: Option<&str>,
    secret: Option<&SecretRef>,
) -> Result<Option<String>, ResolutionError>
where
    R: ReadSecret + ?Sized,
{
    if let Some(value) = literal.filter(|v| !v.is_empty()) {
        return Ok(Some(value.to_string()));
    }
    match secret {
        Some(secret) => resolver.read_secret(secret).await.map(Some),
        None => Ok(None),
    }
}

fn parse_url(url: &str) -> Result<Url, ResolutionError> {
    url.parse()
        .map_err(|error| ResolutionError::invalid_url(url, error))
}
