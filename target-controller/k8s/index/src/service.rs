use crate::raw::{Endpoint, RawTarget, SecretSpec};
use auth_proxy_target_controller_core::{SecretRef, SourceId, TargetPort};
use auth_proxy_target_controller_k8s_api::{annotations, ResourceExt, Service};
use std::collections::BTreeMap;

/// Extracts the target defined by a service's annotations.
///
/// A service defines a target only when it has a host annotation and declares at least one
/// port; otherwise no targets are returned.
pub fn service_targets(service: &Service, source: &SourceId) -> Vec<RawTarget> {
    let anns = service.annotations();
    let has_ports = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .is_some_and(|ports| !ports.is_empty());

    let host = match anns.get(annotations::HOST) {
        Some(host) if has_ports && !host.trim().is_empty() => host.trim(),
        _ => {
            tracing::debug!(%source, "ignoring service without host annotation or ports");
            return vec![];
        }
    };

    let bearer_token_secret =
        match secret_annotation(anns, annotations::BEARER_TOKEN_SECRET, &source.namespace) {
            Ok(secret) => secret,
            Err(error) => {
                tracing::warn!(%source, %error, annotation = annotations::BEARER_TOKEN_SECRET, "invalid secret reference");
                return vec![];
            }
        };
    let basic_auth_password_secret =
        match secret_annotation(anns, annotations::BASIC_AUTH_PASSWORD_SECRET, &source.namespace) {
            Ok(secret) => secret,
            Err(error) => {
                tracing::warn!(%source, %error, annotation = annotations::BASIC_AUTH_PASSWORD_SECRET, "invalid secret reference");
                return vec![];
            }
        };

    let mut target = RawTarget::new(source, source.clone(), host);
    target.endpoint = Some(Endpoint::Service(Box::new(service.clone())));
    target.target_port = anns
        .get(annotations::TARGET_PORT)
        .map(|port| port.trim())
        .filter(|port| !port.is_empty())
        .map(|port| TargetPort::Name(port.to_string()));
    target.bearer_token_secret = bearer_token_secret;
    target.basic_auth_username = anns.get(annotations::BASIC_AUTH_USERNAME).cloned();
    target.basic_auth_password = anns.get(annotations::BASIC_AUTH_PASSWORD).cloned();
    target.basic_auth_password_secret = basic_auth_password_secret;

    let conditions = &mut target.conditions;
    conditions.allowed_emails = list_annotation(anns, annotations::ALLOWED_EMAILS);
    conditions.email_domains = list_annotation(anns, annotations::EMAIL_DOMAINS);
    conditions.github_allowed_organizations =
        lowercase(list_annotation(anns, annotations::GITHUB_ALLOWED_ORGS));
    conditions.github_allowed_teams =
        lowercase(list_annotation(anns, annotations::GITHUB_ALLOWED_TEAMS));
    conditions.github_allowed_users =
        lowercase(list_annotation(anns, annotations::GITHUB_ALLOWED_USERS));

    vec![target]
}

/// Splits a comma-delimited list, dropping empty entries.
pub(crate) fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Into::into)
        .collect()
}

fn list_annotation(anns: &BTreeMap<String, String>, annotation: &str) -> Option<Vec<String>> {
    anns.get(annotation)
        .map(|v| parse_list(v))
        .filter(|list| !list.is_empty())
}

fn lowercase(list: Option<Vec<String>>) -> Option<Vec<String>> {
    list.map(|l| l.into_iter().map(|s| s.to_lowercase()).collect())
}

fn secret_annotation(
    anns: &BTreeMap<String, String>,
    annotation: &str,
    namespace: &str,
) -> serde_json::Result<Option<SecretRef>> {
    match anns.get(annotation) {
        None => Ok(None),
        Some(json) => {
            let spec = serde_json::from_str::<SecretSpec>(json)?;
            Ok(Some(spec.into_ref(namespace)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_proxy_target_controller_core::SourceKind;
    use auth_proxy_target_controller_k8s_api::{ObjectMeta, ServicePort, ServiceSpec};
    use maplit::btreemap;

    fn mk_service(anns: BTreeMap<String, String>, ports: Vec<i32>) -> Service {
        Service {
            metadata: ObjectMeta {
                namespace: Some("ns-0".to_string()),
                name: Some("web".to_string()),
                annotations: Some(anns),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                ports: Some(
                    ports
                        .into_iter()
                        .map(|port| ServicePort {
                            port,
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn source() -> SourceId {
        SourceId::new(SourceKind::Service, "ns-0", "web")
    }

    #[test]
    fn requires_host_and_ports() {
        assert!(service_targets(&mk_service(btreemap! {}, vec![80]), &source()).is_empty());
        let anns = btreemap! { annotations::HOST.to_string() => "web.example.com".to_string() };
        assert!(service_targets(&mk_service(anns.clone(), vec![]), &source()).is_empty());
        assert_eq!(service_targets(&mk_service(anns, vec![80]), &source()).len(), 1);
    }

    #[test]
    fn reads_annotations() {
        let anns = btreemap! {
            annotations::HOST.to_string() => "web.example.com".to_string(),
            annotations::TARGET_PORT.to_string() => "http".to_string(),
            annotations::ALLOWED_EMAILS.to_string() => "Jane@Example.com, joe@example.com".to_string(),
            annotations::EMAIL_DOMAINS.to_string() => "example.com".to_string(),
            annotations::GITHUB_ALLOWED_ORGS.to_string() => "Acme,,Umbrella".to_string(),
            annotations::GITHUB_ALLOWED_TEAMS.to_string() => "Acme/Ops".to_string(),
            annotations::BASIC_AUTH_USERNAME.to_string() => "admin".to_string(),
            annotations::BASIC_AUTH_PASSWORD_SECRET.to_string() =>
                r#"{"secretName": "web-auth", "dataName": "password"}"#.to_string(),
            annotations::BEARER_TOKEN_SECRET.to_string() =>
                r#"{"namespace": "shared", "secretName": "tokens"}"#.to_string(),
        };
        let svc = mk_service(anns, vec![80]);
        let targets = service_targets(&svc, &source());
        let [target] = &targets[..] else {
            panic!("expected one target: {targets:?}");
        };

        assert_eq!(target.key, "service/ns-0/web");
        assert_eq!(target.host, "web.example.com");
        assert_eq!(target.endpoint, Some(Endpoint::Service(Box::new(svc.clone()))));
        assert_eq!(target.target_port, Some(TargetPort::Name("http".to_string())));
        assert_eq!(target.basic_auth_username.as_deref(), Some("admin"));
        assert_eq!(
            target.basic_auth_password_secret,
            Some(SecretRef {
                namespace: "ns-0".to_string(),
                name: "web-auth".to_string(),
                key: Some("password".to_string()),
            })
        );
        assert_eq!(
            target.bearer_token_secret,
            Some(SecretRef {
                namespace: "shared".to_string(),
                name: "tokens".to_string(),
                key: None,
            })
        );

        let conditions = &target.conditions;
        assert_eq!(
            conditions.allowed_emails,
            Some(vec!["Jane@Example.com".to_string(), "joe@example.com".to_string()])
        );
        assert_eq!(conditions.email_domains, Some(vec!["example.com".to_string()]));
        assert_eq!(
            conditions.github_allowed_organizations,
            Some(vec!["acme".to_string(), "umbrella".to_string()])
        );
        assert_eq!(
            conditions.github_allowed_teams,
            Some(vec!["acme/ops".to_string()])
        );
        assert_eq!(conditions.github_allowed_users, None);
    }

    #[test]
    fn invalid_secret_reference_yields_no_targets() {
        let anns = btreemap! {
            annotations::HOST.to_string() => "web.example.com".to_string(),
            annotations::BEARER_TOKEN_SECRET.to_string() => "tokens".to_string(),
        };
        assert!(service_targets(&mk_service(anns, vec![80]), &source()).is_empty());
    }
}
