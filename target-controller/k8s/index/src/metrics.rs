use auth_proxy_target_controller_core::SourceKind;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct RegistryMetrics {
    objects_observed: Family<KindLabels, Counter>,
    targets_updated: Family<KindLabels, Counter>,
    targets_deleted: Family<KindLabels, Counter>,
    stale_updates: Family<KindLabels, Counter>,
    update_errors: Family<KindLabels, Counter>,
    sources: Gauge,
    targets: Gauge,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: &'static str,
}

impl RegistryMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "objects_observed",
            "Count of object updates observed from the cluster",
            metrics.objects_observed.clone(),
        );
        prom.register(
            "targets_updated",
            "Count of targets published as updated",
            metrics.targets_updated.clone(),
        );
        prom.register(
            "targets_deleted",
            "Count of targets published as deleted",
            metrics.targets_deleted.clone(),
        );
        prom.register(
            "stale_updates",
            "Count of compiled updates discarded because a newer update was observed",
            metrics.stale_updates.clone(),
        );
        prom.register(
            "update_errors",
            "Count of targets that could not be compiled",
            metrics.update_errors.clone(),
        );
        prom.register(
            "sources",
            "Gauge of the number of objects that currently define targets",
            metrics.sources.clone(),
        );
        prom.register(
            "targets",
            "Gauge of the number of targets currently published",
            metrics.targets.clone(),
        );
        metrics
    }

    pub(crate) fn observed(&self, kind: SourceKind) {
        self.objects_observed.get_or_create(&kind.into()).inc();
    }

    pub(crate) fn updated(&self, kind: SourceKind, n: usize) {
        self.targets_updated
            .get_or_create(&kind.into())
            .inc_by(n as u64);
    }

    pub(crate) fn deleted(&self, kind: SourceKind, n: usize) {
        self.targets_deleted
            .get_or_create(&kind.into())
            .inc_by(n as u64);
    }

    pub(crate) fn stale(&self, kind: SourceKind) {
        self.stale_updates.get_or_create(&kind.into()).inc();
    }

    pub(crate) fn error(&self, kind: SourceKind) {
        self.update_errors.get_or_create(&kind.into()).inc();
    }

    pub(crate) fn set_size(&self, sources: usize, targets: usize) {
        self.sources.set(sources as i64);
        self.targets.set(targets as i64);
    }

    #[cfg(test)]
    pub(crate) fn stale_count(&self, kind: SourceKind) -> u64 {
        self.stale_updates.get_or_create(&kind.into()).get()
    }

    #[cfg(test)]
    pub(crate) fn error_count(&self, kind: SourceKind) -> u64 {
        self.update_errors.get_or_create(&kind.into()).get()
    }

    #[cfg(test)]
    pub(crate) fn size(&self) -> (i64, i64) {
        (self.sources.get(), self.targets.get())
    }
}

impl From<SourceKind> for KindLabels {
    fn from(kind: SourceKind) -> Self {
        Self {
            kind: kind.as_str(),
        }
    }
}
