use crate::raw::{Endpoint, RawTarget, SecretSpec};
use ahash::AHashSet as HashSet;
use auth_proxy_target_controller_core::{RawConditions, SourceId, TargetPort};
use auth_proxy_target_controller_k8s_api::{ConfigMap, Secret};
use serde::Deserialize;

/// A targets file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid targets file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("file is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// The targets read from one file.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub targets: Vec<RawTarget>,

    /// Hosts claimed by more than one target. Only the first such target is kept.
    pub duplicate_hosts: Vec<String>,
}

/// The document held by each data entry of a config map or secret.
#[derive(Debug, Deserialize)]
struct TargetsFile {
    targets: Option<Vec<FileTarget>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileTarget {
    host: String,
    target_url: Option<String>,
    ws_target_url: Option<String>,
    service: Option<String>,
    target_port: Option<TargetPort>,
    bearer_token: Option<String>,
    bearer_token_secret: Option<SecretSpec>,
    basic_auth_username: Option<String>,
    basic_auth_password: Option<String>,
    basic_auth_password_secret: Option<SecretSpec>,
    #[serde(flatten)]
    conditions: RawConditions,
}

/// Extracts the targets defined by every file in a config map. Files that can't be parsed are
/// skipped.
pub fn configmap_targets(configmap: &ConfigMap, source: &SourceId) -> Vec<RawTarget> {
    let mut targets = Vec::new();
    for (filename, contents) in configmap.data.iter().flatten() {
        match parse_targets_file(source, filename, contents) {
            Ok(file) => targets.extend(file.targets),
            Err(error) => {
                tracing::warn!(%source, %filename, %error, "ignoring targets file");
            }
        }
    }
    targets
}

/// Extracts the targets defined by every file in a secret. Files that can't be decoded or
/// parsed are skipped.
pub fn secret_targets(secret: &Secret, source: &SourceId) -> Vec<RawTarget> {
    let mut targets = Vec::new();
    for (filename, contents) in secret.data.iter().flatten() {
        let parsed = String::from_utf8(contents.0.clone())
            .map_err(ValidationError::from)
            .and_then(|contents| parse_targets_file(source, filename, &contents));
        match parsed {
            Ok(file) => targets.extend(file.targets),
            Err(error) => {
                tracing::warn!(%source, %filename, %error, "ignoring targets file");
            }
        }
    }
    targets
}

/// Parses a single targets file.
///
/// Targets are keyed by `<source>/<filename>/<host>`. When several targets share a host, only
/// the first is kept. Targets that forward to a service by name always resolve that service in
/// the source's namespace.
pub fn parse_targets_file(
    source: &SourceId,
    filename: &str,
    contents: &str,
) -> Result<ParsedFile, ValidationError> {
    let file = serde_yaml::from_str::<TargetsFile>(contents)?;
    let Some(entries) = file.targets else {
        tracing::warn!(%source, %filename, "file has no targets");
        return Ok(ParsedFile::default());
    };

    let mut hosts = HashSet::with_capacity(entries.len());
    let mut parsed = ParsedFile::default();
    for entry in entries {
        if !hosts.insert(entry.host.clone()) {
            if !parsed.duplicate_hosts.contains(&entry.host) {
                parsed.duplicate_hosts.push(entry.host);
            }
            continue;
        }
        parsed.targets.push(entry.into_raw(source, filename));
    }
    if !parsed.duplicate_hosts.is_empty() {
        tracing::warn!(
            %source,
            %filename,
            hosts = ?parsed.duplicate_hosts,
            "file has multiple targets with the same host; some will be ignored"
        );
    }

    Ok(parsed)
}

// === impl FileTarget ===

impl FileTarget {
    fn into_raw(self, source: &SourceId, filename: &str) -> RawTarget {
        let namespace = &source.namespace;
        let key = format!("{source}/{filename}/{}", self.host);
        let mut target = RawTarget::new(key, source.clone(), self.host);

        target.endpoint = match (self.target_url, self.service) {
            (Some(url), _) => Some(Endpoint::Url(url)),
            (None, Some(name)) => Some(Endpoint::ServiceName {
                namespace: namespace.clone(),
                name,
            }),
            (None, None) => None,
        };
        target.target_port = self.target_port;
        target.ws_target_url = self.ws_target_url;
        target.bearer_token = self.bearer_token;
        target.bearer_token_secret = self.bearer_token_secret.map(|s| s.into_ref(namespace));
        target.basic_auth_username = self.basic_auth_username;
        target.basic_auth_password = self.basic_auth_password;
        target.basic_auth_password_secret =
            self.basic_auth_password_secret.map(|s| s.into_ref(namespace));
        target.conditions = self.conditions;
        target
    }
}
