//! Source-range allowlisting of client addresses.
//!
//! Unlike most modules, an invalid range is not replaced by the default: the
//! error is surfaced and the extractor denies the affected locations.

use crate::{IngressAnnotation, ModuleConfig};
use ingress_controller_core::{
    validate, AnnotationField, Annotations, Definitions, IpNet, Resolver, Result, Risk, Scope,
    Settings, Validator,
};
use ingress_controller_k8s_api::{Ingress, ResourceExt};
use tracing::info;

pub const ALLOWLIST_SOURCE_RANGE: &str = "allowlist-source-range";
pub const WHITELIST_SOURCE_RANGE: &str = "whitelist-source-range";

pub static ANNOTATIONS: Definitions = Definitions {
    fields: &[AnnotationField {
        name: ALLOWLIST_SOURCE_RANGE,
        aliases: &[WHITELIST_SOURCE_RANGE],
        validator: Validator::Func(validate::cidr_list),
        scope: Scope::Location,
        risk: Risk::Medium,
        documentation: "Comma-separated list of client IP source ranges permitted to reach the \
                        location",
    }],
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Sorted and deduplicated. Empty permits all clients.
    pub cidrs: Vec<IpNet>,
}

#[derive(Clone, Debug)]
pub struct Parser {
    settings: Settings,
}

// === impl Parser ===

impl Parser {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn parse_config(&self, ingress: &Ingress, resolver: &dyn Resolver) -> Result<Config> {
        let anns = Annotations::new(&self.settings, ingress, &ANNOTATIONS);
        let mut cidrs = match anns.get(ALLOWLIST_SOURCE_RANGE, validate::parse_cidrs) {
            Ok(cidrs) => cidrs,
            Err(error) if error.is_missing_annotations() => {
                resolver.default_backend().allowlist_source_range
            }
            Err(error) => {
                info!(
                    ns = %ingress.namespace().unwrap_or_default(),
                    name = %ingress.name_any(),
                    %error,
                    "Invalid source range allowlist",
                );
                return Err(error);
            }
        };
        cidrs.sort();
        cidrs.dedup();
        Ok(Config { cidrs })
    }
}

impl IngressAnnotation for Parser {
    fn name(&self) -> &'static str {
        "allowlist"
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn documentation(&self) -> &'static Definitions {
        &ANNOTATIONS
    }

    fn parse(&self, ingress: &Ingress, resolver: &dyn Resolver) -> Result<ModuleConfig> {
        self.parse_config(ingress, resolver).map(ModuleConfig::Allowlist)
    }

    fn denies_on_error(&self) -> bool {
        true
    }
}
