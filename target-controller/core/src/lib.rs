//! Types shared between the target index and its consumers.
//!
//! Nothing in this crate knows about the Kubernetes API; the k8s crates translate cluster
//! objects into these types.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod condition;
mod resolve;
mod source;
mod target;

pub use self::{
    condition::{Condition, RawConditions},
    resolve::{ReadSecret, ResolutionError, ResolveService, SecretRef, TargetPort},
    source::{SourceId, SourceKind},
    target::{CompiledTarget, HeaderValue, Headers},
};
pub use url::Url;

use std::sync::Arc;

/// An update published to the routing table.
#[derive(Clone, Debug)]
pub enum TargetEvent {
    /// The target was added or re-announced. Consumers replace any target with the same key.
    Updated(CompiledTarget),

    /// The target no longer exists.
    Deleted(CompiledTarget),

    /// A watch failed. Informational: no target state is changed by it.
    Error(Arc<anyhow::Error>),
}
