use ahash::AHashSet as HashSet;
use auth_proxy_target_controller_core::{CompiledTarget, TargetEvent};

/// Computes the events that move a source from its `previous` targets to its `next` targets.
///
/// Targets whose keys are absent from `next` are deleted first. Every target in `next` is then
/// published as updated, whether or not it changed.
pub(crate) fn diff(previous: &[CompiledTarget], next: &[CompiledTarget]) -> Vec<TargetEvent> {
    let keys = next.iter().map(|t| t.key.as_str()).collect::<HashSet<_>>();
    let deleted = previous
        .iter()
        .filter(|t| !keys.contains(t.key.as_str()))
        .cloned()
        .map(TargetEvent::Deleted);
    let updated = next.iter().cloned().map(TargetEvent::Updated);
    deleted.chain(updated).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_proxy_target_controller_core::{SourceId, SourceKind};

    fn mk_target(host: &str) -> CompiledTarget {
        CompiledTarget {
            key: format!("configmap/ns-0/targets/t.yaml/{host}"),
            source: SourceId::new(SourceKind::ConfigMap, "ns-0", "targets"),
            target_url: format!("http://{host}:8080").parse().unwrap(),
            ws_target_url: format!("ws://{host}:8080").parse().unwrap(),
            host: host.to_string(),
            conditions: vec![],
            headers: None,
        }
    }

    fn summarize(events: &[TargetEvent]) -> Vec<String> {
        events
            .iter()
            .map(|ev| match ev {
                TargetEvent::Updated(t) => format!("updated {}", t.host),
                TargetEvent::Deleted(t) => format!("deleted {}", t.host),
                TargetEvent::Error(e) => format!("error {e}"),
            })
            .collect()
    }

    #[test]
    fn deletes_then_updates() {
        let previous = [mk_target("a"), mk_target("b")];
        let next = [mk_target("b"), mk_target("c")];
        assert_eq!(
            summarize(&diff(&previous, &next)),
            ["deleted a", "updated b", "updated c"]
        );
    }

    #[test]
    fn unchanged_targets_are_republished() {
        let targets = [mk_target("a"), mk_target("b")];
        assert_eq!(
            summarize(&diff(&targets, &targets)),
            ["updated a", "updated b"]
        );
    }

    #[test]
    fn empty_next_deletes_everything() {
        let previous = [mk_target("a"), mk_target("b")];
        assert_eq!(
            summarize(&diff(&previous, &[])),
            ["deleted a", "deleted b"]
        );
        assert!(diff(&[], &[]).is_empty());
    }
}
