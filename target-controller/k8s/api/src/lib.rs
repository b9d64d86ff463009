#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod annotations;
mod watch;

pub use self::watch::{watch, Relist, WatchEvent};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{ConfigMap, Secret, Service, ServicePort, ServiceSpec},
    },
    ByteString,
};
pub use kube::{
    api::{Api, ObjectMeta, ResourceExt},
    runtime::watcher,
    Client, Resource,
};
