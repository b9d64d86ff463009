use crate::{
    compile::{compile, TargetError},
    diff::diff,
    file::{configmap_targets, secret_targets},
    metrics::RegistryMetrics,
    raw::RawTarget,
    revision::{Revision, Revisions},
    service::service_targets,
};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use auth_proxy_target_controller_core::{
    CompiledTarget, Condition, ReadSecret, ResolveService, SourceId, SourceKind, TargetEvent,
};
use auth_proxy_target_controller_k8s_api::{ConfigMap, Resource, Secret, Service, WatchEvent};
use futures::{future::BoxFuture, prelude::*, stream::FuturesUnordered};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone, Debug, Default)]
pub struct Config {
    /// When set, objects in other namespaces are ignored.
    pub namespaces: Option<HashSet<String>>,

    /// Applied to targets that don't specify GitHub conditions.
    pub default_conditions: Vec<Condition>,
}

/// An observation from one of the registry's watches.
#[derive(Debug)]
pub enum Event {
    Service(WatchEvent<Service>),
    ConfigMap(WatchEvent<ConfigMap>),
    Secret(WatchEvent<Secret>),
}

/// Maintains the compiled targets of every source and publishes changes to them.
///
/// The registry is driven by a single task (see [`Registry::run`]). Target compilation happens
/// concurrently on that task, and results are applied in the order they complete.
pub struct Registry<R> {
    resolver: Arc<R>,
    defaults: Arc<[Condition]>,
    namespaces: Option<HashSet<String>>,
    metrics: RegistryMetrics,

    /// Only sources with at least one compiled target are stored.
    sources: HashMap<SourceId, Vec<CompiledTarget>>,
    revisions: Revisions,

    tx: mpsc::UnboundedSender<TargetEvent>,
}

/// The results of compiling every target observed in one update to a source.
pub(crate) struct Batch {
    source: SourceId,
    revision: Revision,
    results: Vec<Result<CompiledTarget, TargetError>>,
}

// === impl Event ===

impl From<WatchEvent<Service>> for Event {
    fn from(ev: WatchEvent<Service>) -> Self {
        Self::Service(ev)
    }
}

impl From<WatchEvent<ConfigMap>> for Event {
    fn from(ev: WatchEvent<ConfigMap>) -> Self {
        Self::ConfigMap(ev)
    }
}

impl From<WatchEvent<Secret>> for Event {
    fn from(ev: WatchEvent<Secret>) -> Self {
        Self::Secret(ev)
    }
}

// === impl Registry ===

impl<R> Registry<R>
where
    R: ResolveService + ReadSecret + 'static,
{
    pub fn new(
        config: Config,
        resolver: Arc<R>,
        metrics: RegistryMetrics,
    ) -> (Self, mpsc::UnboundedReceiver<TargetEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Self {
            resolver,
            defaults: config.default_conditions.into(),
            namespaces: config.namespaces,
            metrics,
            sources: HashMap::default(),
            revisions: Revisions::default(),
            tx,
        };
        (registry, rx)
    }

    /// Processes watch events until `shutdown` completes or the event stream ends.
    ///
    /// When the event stream ends, in-flight compilations are allowed to finish. On return,
    /// every remaining target is published as deleted and the event channel is closed. The
    /// output of `shutdown` is held until then.
    pub async fn run<S, F>(mut self, events: S, shutdown: F)
    where
        S: Stream<Item = Event>,
        F: Future,
    {
        let mut events = Box::pin(events);
        tokio::pin!(shutdown);

        let mut compiling = FuturesUnordered::new();
        let mut watching = true;
        let released = loop {
            if !watching && compiling.is_empty() {
                break None;
            }

            tokio::select! {
                biased;

                handle = &mut shutdown => {
                    tracing::debug!("shutdown signaled");
                    break Some(handle);
                }

                Some(batch) = compiling.next(), if !compiling.is_empty() => self.complete(batch),

                event = events.next(), if watching => match event {
                    Some(event) => {
                        if let Some(batch) = self.handle(event) {
                            compiling.push(batch);
                        }
                    }
                    None => {
                        tracing::debug!("watches ended");
                        watching = false;
                    }
                },
            }
        };

        drop(events);
        drop(compiling);
        self.close();
        drop(released);
    }

    /// Applies a single watch event.
    ///
    /// When the event requires targets to be compiled, the returned batch must be driven to
    /// completion and passed to [`Registry::complete`].
    pub(crate) fn handle(&mut self, event: Event) -> Option<BoxFuture<'static, Batch>> {
        match event {
            Event::Service(ev) => self.handle_watch(SourceKind::Service, ev, service_targets),
            Event::ConfigMap(ev) => self.handle_watch(SourceKind::ConfigMap, ev, configmap_targets),
            Event::Secret(ev) => self.handle_watch(SourceKind::Secret, ev, secret_targets),
        }
    }

    /// Applies a compiled batch if it reflects the latest observation of its source.
    pub(crate) fn complete(&mut self, batch: Batch) {
        let Batch {
            source,
            revision,
            results,
        } = batch;

        if !self.revisions.is_current(&source, revision) {
            tracing::debug!(%source, %revision, "discarding stale update");
            self.metrics.stale(source.kind);
            return;
        }

        let previous = self.sources.remove(&source).unwrap_or_default();
        let mut next = Vec::with_capacity(results.len());
        let mut failed = 0;
        for result in results {
            match result {
                Ok(target) => next.push(target),
                Err(error) => {
                    tracing::error!(%error, "failed to compile target");
                    self.metrics.error(source.kind);
                    failed += 1;
                }
            }
        }

        // A batch with failures never deletes a previously published target.
        if failed > 0 {
            if next.is_empty() {
                tracing::debug!(%source, failed, "no targets compiled; keeping previous targets");
                if !previous.is_empty() {
                    self.sources.insert(source, previous);
                }
                return;
            }
            let kept = previous
                .iter()
                .filter(|t| !next.iter().any(|n| n.key == t.key))
                .cloned()
                .collect::<Vec<_>>();
            next.extend(kept);
        }

        self.publish(source.kind, diff(&previous, &next));
        self.sources.insert(source, next);
        self.update_size();
    }

    /// Publishes a deletion for every target of `source` and forgets it.
    pub(crate) fn delete_source(&mut self, source: &SourceId) {
        self.revisions.forget(source);
        if let Some(targets) = self.sources.remove(source) {
            tracing::debug!(%source, targets = targets.len(), "deleting source");
            self.publish(source.kind, diff(&targets, &[]));
            self.update_size();
        }
    }

    /// Publishes a deletion for every target of every source.
    fn close(&mut self) {
        let sources = std::mem::take(&mut self.sources);
        for (source, targets) in sources {
            self.revisions.forget(&source);
            self.publish(source.kind, diff(&targets, &[]));
        }
        self.update_size();
    }

    fn handle_watch<K: Resource>(
        &mut self,
        kind: SourceKind,
        event: WatchEvent<K>,
        targets: fn(&K, &SourceId) -> Vec<RawTarget>,
    ) -> Option<BoxFuture<'static, Batch>> {
        match event {
            WatchEvent::Updated(obj) => {
                let source = self.source_id(kind, &obj)?;
                self.metrics.observed(kind);
                let raw = targets(&obj, &source);
                self.update(source, raw)
            }

            WatchEvent::Deleted(obj) => {
                let source = self.source_id(kind, &obj)?;
                self.delete_source(&source);
                None
            }

            WatchEvent::Error(error) => {
                tracing::warn!(%kind, %error, "watch failed");
                self.send(TargetEvent::Error(Arc::new(error)));
                None
            }
        }
    }

    /// Identifies the source an object defines, unless the object is to be ignored.
    fn source_id<K: Resource>(&self, kind: SourceKind, obj: &K) -> Option<SourceId> {
        let meta = obj.meta();
        let Some(name) = meta.name.as_deref() else {
            tracing::debug!(%kind, "ignoring object without a name");
            return None;
        };
        let namespace = meta.namespace.as_deref().unwrap_or("default");
        if let Some(namespaces) = &self.namespaces {
            if !namespaces.contains(namespace) {
                tracing::trace!(%kind, %namespace, %name, "ignoring object in unwatched namespace");
                return None;
            }
        }
        Some(SourceId::new(kind, namespace, name))
    }

    fn update(
        &mut self,
        source: SourceId,
        raw: Vec<RawTarget>,
    ) -> Option<BoxFuture<'static, Batch>> {
        if raw.is_empty() {
            self.delete_source(&source);
            return None;
        }

        let revision = self.revisions.observe(&source);
        let resolver = self.resolver.clone();
        let defaults = self.defaults.clone();
        Some(Box::pin(async move {
            let results =
                future::join_all(raw.into_iter().map(|raw| compile(&*resolver, raw, &defaults)))
                    .await;
            Batch {
                source,
                revision,
                results,
            }
        }))
    }

    fn publish(&self, kind: SourceKind, events: Vec<TargetEvent>) {
        for event in events {
            match &event {
                TargetEvent::Updated(target) => {
                    tracing::debug!(source = %target.source, host = %target.host, "updated target");
                    self.metrics.updated(kind, 1);
                }
                TargetEvent::Deleted(target) => {
                    tracing::debug!(source = %target.source, host = %target.host, "deleted target");
                    self.metrics.deleted(kind, 1);
                }
                TargetEvent::Error(_) => {}
            }
            self.send(event);
        }
    }

    fn send(&self, event: TargetEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("target event receiver dropped");
        }
    }

    fn update_size(&self) {
        let targets = self.sources.values().map(Vec::len).sum();
        self.metrics.set_size(self.sources.len(), targets);
    }

    #[cfg(test)]
    pub(crate) fn targets(&self, source: &SourceId) -> Option<&[CompiledTarget]> {
        self.sources.get(source).map(Vec::as_slice)
    }

    #[cfg(test)]
    pub(crate) fn revisions(&self) -> usize {
        self.revisions.len()
    }
}
