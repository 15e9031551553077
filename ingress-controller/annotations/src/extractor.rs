use crate::{
    allowlist, backend_protocol, default_backend, ratelimit, wallarm, IngressAnnotation,
    ModuleConfig,
};
use ingress_controller_core::{risk, Error, Resolver, Settings};
use ingress_controller_k8s_api::{Ingress, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// Runs every annotation module over an Ingress.
pub struct Extractor {
    settings: Settings,
    modules: Vec<Box<dyn IngressAnnotation>>,
}

/// The aggregated annotation configuration of a single Ingress.
///
/// A `None` module slot means the module is not configured (or failed to
/// parse) for this Ingress.
#[derive(Clone, Debug, Default)]
pub struct IngressConfig {
    pub namespace: String,
    pub name: String,

    /// Set when a strict module failed to parse. The Ingress' locations
    /// must reject all traffic.
    pub denied: Option<String>,

    pub allowlist: Option<allowlist::Config>,
    pub backend_protocol: Option<backend_protocol::Protocol>,
    pub default_backend: Option<default_backend::Config>,
    pub rate_limit: Option<ratelimit::Config>,
    pub wallarm: Option<wallarm::Config>,
}

// === impl Extractor ===

impl Default for Extractor {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Extractor {
    pub fn new(settings: Settings) -> Self {
        let modules: Vec<Box<dyn IngressAnnotation>> = vec![
            Box::new(allowlist::Parser::new(settings.clone())),
            Box::new(backend_protocol::Parser::new(settings.clone())),
            Box::new(default_backend::Parser::new(settings.clone())),
            Box::new(ratelimit::Parser::new(settings.clone())),
            Box::new(wallarm::Parser::new(settings.clone())),
        ];
        Self { settings, modules }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn modules(&self) -> impl Iterator<Item = &dyn IngressAnnotation> {
        self.modules.iter().map(|m| m.as_ref())
    }

    /// Extracts every module's configuration from `ingress`.
    ///
    /// Never fails: modules that are not configured are left empty, and
    /// errors from strict modules mark the configuration as denied.
    pub fn extract(&self, ingress: &Ingress, resolver: &dyn Resolver) -> IngressConfig {
        let mut config = IngressConfig {
            namespace: ingress.namespace().unwrap_or_default(),
            name: ingress.name_any(),
            ..IngressConfig::default()
        };

        for module in &self.modules {
            match module.parse(ingress, resolver) {
                Ok(parsed) => config.set(parsed),
                Err(Error::MissingAnnotations) => {
                    trace!(module = module.name(), "Not configured");
                }
                Err(error) => {
                    if module.denies_on_error() {
                        warn!(
                            ns = %config.namespace,
                            name = %config.name,
                            module = module.name(),
                            %error,
                            "Denying ingress locations",
                        );
                        if config.denied.is_none() {
                            config.denied = Some(error.to_string());
                        }
                    } else {
                        debug!(
                            ns = %config.namespace,
                            name = %config.name,
                            module = module.name(),
                            %error,
                            "Ignoring module",
                        );
                    }
                }
            }
        }

        config
    }

    /// Checks an annotation map against every module's risk classification,
    /// returning all violations.
    pub fn validate(
        &self,
        annotations: &BTreeMap<String, String>,
        resolver: &dyn Resolver,
    ) -> Vec<Error> {
        self.modules
            .iter()
            .filter_map(|m| m.validate(annotations, resolver).err())
            .collect()
    }

    /// Checks every known annotation value against its validator, returning
    /// all violations.
    pub fn check_values(&self, annotations: &BTreeMap<String, String>) -> Vec<Error> {
        self.modules
            .iter()
            .filter_map(|m| {
                risk::check_annotation_values(annotations, &self.settings, m.documentation()).err()
            })
            .collect()
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("settings", &self.settings)
            .field("modules", &self.modules().map(|m| m.name()).collect::<Vec<_>>())
            .finish()
    }
}

// === impl IngressConfig ===

impl IngressConfig {
    fn set(&mut self, parsed: ModuleConfig) {
        match parsed {
            ModuleConfig::Allowlist(c) => self.allowlist = Some(c),
            ModuleConfig::BackendProtocol(p) => self.backend_protocol = Some(p),
            ModuleConfig::DefaultBackend(c) => self.default_backend = Some(c),
            ModuleConfig::RateLimit(c) => self.rate_limit = Some(c),
            ModuleConfig::Wallarm(c) => self.wallarm = Some(c),
        }
    }

    pub fn is_denied(&self) -> bool {
        self.denied.is_some()
    }
}

impl PartialEq for IngressConfig {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace
            && self.name == other.name
            && self.denied == other.denied
            && crate::equal(self.allowlist.as_ref(), other.allowlist.as_ref())
            && crate::equal(self.backend_protocol.as_ref(), other.backend_protocol.as_ref())
            && crate::equal(self.default_backend.as_ref(), other.default_backend.as_ref())
            && crate::equal(self.rate_limit.as_ref(), other.rate_limit.as_ref())
            && crate::equal(self.wallarm.as_ref(), other.wallarm.as_ref())
    }
}

impl Eq for IngressConfig {}
