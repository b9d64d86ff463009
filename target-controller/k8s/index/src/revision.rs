use ahash::AHashMap as HashMap;
use auth_proxy_target_controller_core::SourceId;
use std::fmt;

/// Orders the observations of a source. Later observations always have greater revisions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(u64);

/// Tracks the most recently observed revision of each source.
///
/// Revisions are drawn from a single counter shared by all sources, so a source that is
/// forgotten and then observed again never reuses a revision handed out before it was forgotten.
#[derive(Debug, Default)]
pub(crate) struct Revisions {
    last: u64,
    current: HashMap<SourceId, Revision>,
}

// === impl Revision ===

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// === impl Revisions ===

impl Revisions {
    /// Records a new observation of `source`, returning its revision.
    pub(crate) fn observe(&mut self, source: &SourceId) -> Revision {
        self.last += 1;
        let rev = Revision(self.last);
        self.current.insert(source.clone(), rev);
        rev
    }

    /// Whether `rev` is the latest observation of `source`. Forgotten sources have no current
    /// revision.
    pub(crate) fn is_current(&self, source: &SourceId, rev: Revision) -> bool {
        self.current.get(source) == Some(&rev)
    }

    pub(crate) fn forget(&mut self, source: &SourceId) {
        self.current.remove(source);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.current.len()
    }
}
