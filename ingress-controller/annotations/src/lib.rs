//! Ingress annotation modules.
//!
//! Each module reads a group of related annotations (rate limiting, WAF
//! settings, backend protocol, ...) from an Ingress and produces an immutable,
//! typed configuration. Modules implement [`IngressAnnotation`] and are driven
//! by the [`Extractor`], which aggregates their output into an
//! [`IngressConfig`]. The reconciliation loop compares `IngressConfig`s with
//! `==` to decide whether the proxy configuration actually changed.
//!
//! Per-module error policy:
//!
//! - `wallarm`, `ratelimit`, `backend_protocol`: an absent or invalid
//!   annotation silently falls back to the resolver's default.
//! - `allowlist`: an invalid annotation is an error and denies the location.
//! - `default_backend`: an absent annotation disables the module; an invalid
//!   name or unknown Service is an error.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod allowlist;
pub mod backend_protocol;
pub mod default_backend;
mod extractor;
pub mod ratelimit;
pub mod wallarm;

#[cfg(test)]
mod tests;

pub use self::extractor::{Extractor, IngressConfig};
pub use ingress_controller_core as core;

use ingress_controller_core::{risk, Definitions, Resolver, Result, Settings};
use ingress_controller_k8s_api::Ingress;
use std::collections::BTreeMap;

/// A group of annotations parsed into one typed configuration.
pub trait IngressAnnotation: Send + Sync {
    /// A stable, human-readable module name.
    fn name(&self) -> &'static str;

    fn settings(&self) -> &Settings;

    /// The module's annotation table.
    fn documentation(&self) -> &'static Definitions;

    /// Extracts the module's configuration from an Ingress.
    fn parse(&self, ingress: &Ingress, resolver: &dyn Resolver) -> Result<ModuleConfig>;

    /// Indicates whether a parse error should deny the Ingress' locations
    /// rather than merely leave the module unconfigured.
    fn denies_on_error(&self) -> bool {
        false
    }

    /// Rejects annotation maps containing keys above the resolver's risk level.
    fn validate(
        &self,
        annotations: &BTreeMap<String, String>,
        resolver: &dyn Resolver,
    ) -> Result<()> {
        let max = resolver.security_configuration().max_risk();
        risk::check_annotation_risk(annotations, max, self.settings(), self.documentation())
    }
}

/// The output of a single module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleConfig {
    Allowlist(allowlist::Config),
    BackendProtocol(backend_protocol::Protocol),
    DefaultBackend(default_backend::Config),
    RateLimit(ratelimit::Config),
    Wallarm(wallarm::Config),
}

/// Compares two optional module configurations: two absent configurations
/// are equal, an absent and a present one never are.
pub fn equal<T: PartialEq>(a: Option<&T>, b: Option<&T>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
