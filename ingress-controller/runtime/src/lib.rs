//! The ingress controller process: Kubernetes watches feeding the annotation
//! index, the admission webhook, and their configuration.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use ingress_controller_annotations as annotations;
pub use ingress_controller_core as core;
pub use ingress_controller_k8s_api as k8s;

mod admission;
mod args;
pub mod index;
mod index_chain;
pub mod metrics;
pub mod resolver;

pub use self::{admission::Admission, args::Args};
