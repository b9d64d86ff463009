use auth_proxy_target_controller_core::{ResolutionError, TargetPort, Url};
use auth_proxy_target_controller_k8s_api::{ResourceExt, Service};

/// The port used when a service declares none and none is requested.
const DEFAULT_PORT: u16 = 80;

/// Picks the port of `service` that traffic is forwarded to.
///
/// A numeric port is used as-is. A named port matches a declared port's name, then a declared
/// port's number, and is finally read as the number it starts with, so `8080abc` is 8080. With
/// no port requested, the first declared port is used.
pub fn service_port(service: &Service, port: Option<&TargetPort>) -> Result<u16, ResolutionError> {
    let declared = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default();

    let name = match port {
        Some(TargetPort::Number(port)) => return Ok(*port),
        Some(TargetPort::Name(name)) => name,
        None => {
            return Ok(declared
                .first()
                .and_then(|p| u16::try_from(p.port).ok())
                .unwrap_or(DEFAULT_PORT))
        }
    };

    let found = declared
        .iter()
        .find(|p| p.name.as_deref() == Some(name.as_str()))
        .or_else(|| declared.iter().find(|p| p.port.to_string() == *name))
        .and_then(|p| u16::try_from(p.port).ok());
    if let Some(port) = found {
        return Ok(port);
    }

    leading_number(name).ok_or_else(|| ResolutionError::PortNotFound {
        namespace: service.namespace().unwrap_or_else(|| "default".to_string()),
        service: service.name_any(),
        port: name.clone(),
    })
}

/// Reads the decimal number at the start of `s`, ignoring leading whitespace and anything after
/// the digits.
fn leading_number(s: &str) -> Option<u16> {
    let s = s.trim_start();
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

/// Builds the in-cluster URL of a service's port: `http://<name>.<namespace>:<port>/`.
pub fn service_url(service: &Service, port: Option<&TargetPort>) -> Result<Url, ResolutionError> {
    let port = service_port(service, port)?;
    let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
    let url = format!("http://{}.{}:{}", service.name_any(), namespace, port);
    url.parse()
        .map_err(|error| ResolutionError::invalid_url(url, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_proxy_target_controller_k8s_api::{ObjectMeta, ServicePort, ServiceSpec};

    fn mk_service(ports: impl IntoIterator<Item = (Option<&'static str>, i32)>) -> Service {
        Service {
            metadata: ObjectMeta {
                namespace: Some("ns-0".to_string()),
                name: Some("api".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                ports: Some(
                    ports
                        .into_iter()
                        .map(|(name, port)| ServicePort {
                            name: name.map(Into::into),
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

    fn name(n: &str) -> TargetPort {
        TargetPort::Name(n.to_string())
    }

    #[test]
    fn selects_ports() {
        let svc = mk_service([(Some("http"), 80), (Some("grpc"), 9090)]);
        assert_eq!(service_port(&svc, None).unwrap(), 80, "first port");
        assert_eq!(service_port(&svc, Some(&TargetPort::Number(7000))).unwrap(), 7000);
        assert_eq!(service_port(&svc, Some(&name("grpc"))).unwrap(), 9090, "by name");
        assert_eq!(service_port(&svc, Some(&name("9090"))).unwrap(), 9090, "by number");
        assert_eq!(service_port(&svc, Some(&name("8081"))).unwrap(), 8081, "parsed");
    }

    #[test]
    fn unknown_port_names_service() {
        let svc = mk_service([(Some("http"), 80), (Some("grpc"), 9090)]);
        let error = service_port(&svc, Some(&name("bogus"))).unwrap_err();
        assert!(
            matches!(
                &error,
                ResolutionError::PortNotFound { namespace, service, port }
                    if namespace == "ns-0" && service == "api" && port == "bogus"
            ),
            "{error:?}"
        );
        assert_eq!(
            error.to_string(),
            "can't find target port bogus for service ns-0/api"
        );
    }

    #[test]
    fn parses_leading_digits() {
        let svc = mk_service([(Some("http"), 80)]);
        assert_eq!(service_port(&svc, Some(&name("8080abc"))).unwrap(), 8080);
        assert_eq!(service_port(&svc, Some(&name(" 9000 "))).unwrap(), 9000);
        assert!(service_port(&svc, Some(&name("abc8080"))).is_err());
        assert!(service_port(&svc, Some(&name("70000"))).is_err(), "out of range");
    }

    #[test]
    fn defaults_to_port_80() {
        let svc = mk_service([]);
        assert_eq!(service_port(&svc, None).unwrap(), 80);
    }

    #[test]
    fn builds_cluster_url() {
        let svc = mk_service([(None, 8080)]);
        assert_eq!(
            service_url(&svc, None).unwrap().as_str(),
            "http://api.ns-0:8080/"
        );
    }
}
