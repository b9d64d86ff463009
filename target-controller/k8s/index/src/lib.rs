//! Auth proxy target index
//!
//! Derives the proxy's routing targets from cluster objects rather than static configuration.
//! Three kinds of objects define targets:
//!
//! - A `Service` annotated with `kube-auth-proxy/host` defines one target that forwards to the
//!   service itself.
//! - Each data entry of a selected `ConfigMap` is a YAML file holding a list of targets.
//! - Each data entry of a selected `Secret` is likewise a YAML file of targets.
//!
//! ```text
//! [ watch event ] -> [ adapter ] -> [ compile (per target, concurrently) ] -> [ revision gate ]
//!                                                                          -> [ diff ] -> events
//! ```
//!
//! Compiling a target may need to look up the service it points at or read a secret, so
//! compilation is asynchronous and batches for the same object may complete out of order. Each
//! object carries a revision that is bumped when an update is observed; a batch is only applied
//! if its revision is still current when it completes, so the published state of an object is
//! always that of the most recently observed update.
//!
//! All indexing state is owned by the single task that runs the [`Registry`].

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod compile;
mod diff;
mod file;
pub mod metrics;
pub mod ports;
mod raw;
mod registry;
mod resolve;
mod revision;
mod service;


pub use self::{
    compile::{compile, websocket_url, TargetError},
    file::{configmap_targets, parse_targets_file, secret_targets, ParsedFile, ValidationError},
    metrics::RegistryMetrics,
    raw::{Endpoint, RawTarget},
    registry::{Config, Event, Registry},
    resolve::KubeResolver,
    revision::Revision,
    service::service_targets,
};
