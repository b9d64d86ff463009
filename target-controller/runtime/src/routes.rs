use crate::core::{CompiledTarget, TargetEvent};
use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;

pub type SharedRoutes = Arc<RwLock<Routes>>;

/// The live table of targets, by host.
#[derive(Debug, Default)]
pub struct Routes {
    by_host: HashMap<String, CompiledTarget>,
}

/// Applies target events to the table until the registry closes its channel.
pub async fn run(routes: SharedRoutes, mut rx: mpsc::UnboundedReceiver<TargetEvent>) {
    while let Some(event) = rx.recv().await {
        routes.write().apply(event);
    }
    tracing::debug!("target events closed");
}

// === impl Routes ===

impl Routes {
    pub fn shared() -> SharedRoutes {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn apply(&mut self, event: TargetEvent) {
        match event {
            TargetEvent::Updated(target) => {
                if let Some(existing) = self.by_host.get(&target.host) {
                    if existing.key != target.key {
                        tracing::warn!(
                            host = %target.host,
                            replaced = %existing.key,
                            key = %target.key,
                            "multiple targets claim host"
                        );
                    }
                }
                tracing::info!(host = %target.host, url = %target.target_url, source = %target.source, "updated target");
                self.by_host.insert(target.host.clone(), target);
            }

            TargetEvent::Deleted(target) => {
                // Another target may have since claimed the host.
                let claimed = self
                    .by_host
                    .get(&target.host)
                    .is_some_and(|t| t.key == target.key);
                if claimed {
                    tracing::info!(host = %target.host, source = %target.source, "deleted target");
                    self.by_host.remove(&target.host);
                }
            }

            TargetEvent::Error(error) => {
                tracing::warn!(%error, "target discovery failed");
            }
        }
    }

    /// Finds the target serving a request's host: an exact match, or else the target with the
    /// longest host that prefixes it.
    pub fn lookup(&self, host: &str) -> Option<&CompiledTarget> {
        if let Some(target) = self.by_host.get(host) {
            return Some(target);
        }
        self.by_host
            .iter()
            .filter(|(h, _)| host.starts_with(h.as_str()))
            .max_by_key(|(h, _)| h.len())
            .map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}
