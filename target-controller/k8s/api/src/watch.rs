use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use futures::prelude::*;
use kube::{
    api::{Api, ObjectMeta},
    runtime::{watcher, WatchStreamExt},
    Resource,
};
use std::fmt;

/// A change to a watched object.
pub enum WatchEvent<K> {
    Updated(K),
    Deleted(K),

    /// The watch failed. The underlying watch backs off and recovers on its own.
    Error(anyhow::Error),
}

/// Tracks the objects a watch has reported so that objects which disappear while the watch
/// is disconnected are reported as deleted once the watch relists.
#[derive(Debug, Default)]
pub struct Relist {
    known: HashMap<ObjectKey, ObjectMeta>,
    relisted: Option<HashSet<ObjectKey>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ObjectKey {
    namespace: Option<String>,
    name: String,
}

/// Watches all objects the API selects, with backoff between failed attempts.
pub fn watch<K>(api: Api<K>, config: watcher::Config) -> impl Stream<Item = WatchEvent<K>> + Send
where
    K: Resource + Clone + Default + fmt::Debug + serde::de::DeserializeOwned + Send + 'static,
{
    let mut relist = Relist::default();
    watcher(api, config)
        .default_backoff()
        .flat_map(move |event| stream::iter(relist.process(event)))
}

// === impl WatchEvent ===

impl<K: fmt::Debug> fmt::Debug for WatchEvent<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated(obj) => f.debug_tuple("Updated").field(obj).finish(),
            Self::Deleted(obj) => f.debug_tuple("Deleted").field(obj).finish(),
            Self::Error(error) => f.debug_tuple("Error").field(&format_args!("{error}")).finish(),
        }
    }
}

// === impl Relist ===

impl Relist {
    /// Translates a raw watcher event into zero or more watch events.
    pub fn process<K>(&mut self, event: watcher::Result<watcher::Event<K>>) -> Vec<WatchEvent<K>>
    where
        K: Resource + Default,
    {
        let event = match event {
            Ok(event) => event,
            Err(error) => {
                tracing::debug!(%error, "watch failed");
                return vec![WatchEvent::Error(error.into())];
            }
        };

        match event {
            watcher::Event::Apply(obj) => {
                self.known.insert(ObjectKey::of(&obj), obj.meta().clone());
                vec![WatchEvent::Updated(obj)]
            }

            watcher::Event::Delete(obj) => {
                self.known.remove(&ObjectKey::of(&obj));
                vec![WatchEvent::Deleted(obj)]
            }

            watcher::Event::Init => {
                self.relisted = Some(HashSet::default());
                vec![]
            }

            watcher::Event::InitApply(obj) => {
                let key = ObjectKey::of(&obj);
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(key.clone());
                }
                self.known.insert(key, obj.meta().clone());
                vec![WatchEvent::Updated(obj)]
            }

            watcher::Event::InitDone => {
                let Some(relisted) = self.relisted.take() else {
                    return vec![];
                };
                let removed = self
                    .known
                    .keys()
                    .filter(|key| !relisted.contains(*key))
                    .cloned()
                    .collect::<Vec<_>>();

                let mut events = Vec::with_capacity(removed.len());
                for key in removed {
                    if let Some(meta) = self.known.remove(&key) {
                        tracing::debug!(namespace = ?key.namespace, name = %key.name, "removed during relist");
                        let mut obj = K::default();
                        *obj.meta_mut() = meta;
                        events.push(WatchEvent::Deleted(obj));
                    }
                }
                events
            }
        }
    }
}

// === impl ObjectKey ===

impl ObjectKey {
    fn of<K: Resource>(obj: &K) -> Self {
        let meta = obj.meta();
        Self {
            namespace: meta.namespace.clone(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;

    fn mk_configmap(ns: &str, name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                namespace: Some(ns.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn names(events: &[WatchEvent<ConfigMap>]) -> Vec<String> {
        events
            .iter()
            .map(|ev| match ev {
                WatchEvent::Updated(cm) => format!("updated:{}", cm.metadata.name.as_deref().unwrap()),
                WatchEvent::Deleted(cm) => format!("deleted:{}", cm.metadata.name.as_deref().unwrap()),
                WatchEvent::Error(_) => "error".to_string(),
            })
            .collect()
    }

    #[test]
    fn applies_and_deletes_pass_through() {
        let mut relist = Relist::default();
        let events = relist.process(Ok(watcher::Event::Apply(mk_configmap("ns-0", "a"))));
        assert_eq!(names(&events), vec!["updated:a"]);
        let events = relist.process(Ok(watcher::Event::Delete(mk_configmap("ns-0", "a"))));
        assert_eq!(names(&events), vec!["deleted:a"]);
        assert!(relist.known.is_empty());
    }

    #[test]
    fn relist_deletes_missing_objects() {
        let mut relist = Relist::default();
        for ev in [
            watcher::Event::Init,
            watcher::Event::InitApply(mk_configmap("ns-0", "a")),
            watcher::Event::InitApply(mk_configmap("ns-0", "b")),
            watcher::Event::InitDone,
        ] {
            relist.process(Ok(ev));
        }

        // The watch reconnects and `b` is gone.
        let mut events = Vec::new();
        for ev in [
            watcher::Event::Init,
            watcher::Event::InitApply(mk_configmap("ns-0", "a")),
            watcher::Event::InitDone,
        ] {
            events.extend(relist.process(Ok(ev)));
        }
        assert_eq!(names(&events), vec!["updated:a", "deleted:b"]);

        let deleted = match events.pop() {
            Some(WatchEvent::Deleted(cm)) => cm,
            ev => panic!("unexpected event: {ev:?}"),
        };
        assert_eq!(deleted.metadata.namespace.as_deref(), Some("ns-0"));
        assert_eq!(relist.known.len(), 1);
    }
}
