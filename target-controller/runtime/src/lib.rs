#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use auth_proxy_target_controller_core as core;
pub use auth_proxy_target_controller_k8s_api as k8s;
pub use auth_proxy_target_controller_k8s_index as index;

mod args;
pub mod routes;

pub use self::{
    args::Args,
    routes::{Routes, SharedRoutes},
};
