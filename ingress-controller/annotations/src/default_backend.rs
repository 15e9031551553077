//! A custom default backend Service for an Ingress' unmatched requests.

use crate::{IngressAnnotation, ModuleConfig};
use ingress_controller_core::{
    validate, AnnotationField, Annotations, Definitions, Error, Resolver, Result, Risk, Scope,
    Settings, Validator,
};
use ingress_controller_k8s_api::{Ingress, ResourceExt};

pub const DEFAULT_BACKEND: &str = "default-backend";

pub static ANNOTATIONS: Definitions = Definitions {
    fields: &[AnnotationField {
        name: DEFAULT_BACKEND,
        aliases: &[],
        validator: Validator::Func(validate::service_name),
        scope: Scope::Location,
        risk: Risk::Low,
        documentation: "Name of a Service in the Ingress' namespace that handles requests no \
                        rule matches",
    }],
};

/// Identifies the Service that replaces the controller's default backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Config {
    pub namespace: String,
    pub name: String,
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

    /// Returns [`Error::MissingAnnotations`] when no default backend is
    /// configured, so the module stays disabled.
    pub fn parse_config(&self, ingress: &Ingress, resolver: &dyn Resolver) -> Result<Config> {
        let anns = Annotations::new(&self.settings, ingress, &ANNOTATIONS);
        let name = anns.string(DEFAULT_BACKEND)?;
        let namespace = ingress.namespace().unwrap_or_default();

        let svc = resolver.service(&namespace, &name).ok_or_else(|| {
            Error::invalid(
                self.settings.key(DEFAULT_BACKEND),
                format!("there is no service with name {namespace}/{name}"),
            )
        })?;

        Ok(Config {
            namespace: svc.namespace().unwrap_or(namespace),
            name: svc.name_any(),
        })
    }
}

/// Returns the name of the Service `ingress` selects as its default backend,
/// whether or not that Service exists.
pub fn service_name<'a>(settings: &'a Settings, ingress: &'a Ingress) -> Option<&'a str> {
    Annotations::new(settings, ingress, &ANNOTATIONS)
        .raw(DEFAULT_BACKEND)
        .filter(|name| !name.is_empty())
}

impl IngressAnnotation for Parser {
    fn name(&self) -> &'static str {
        "default-backend"
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn documentation(&self) -> &'static Definitions {
        &ANNOTATIONS
    }

    fn parse(&self, ingress: &Ingress, resolver: &dyn Resolver) -> Result<ModuleConfig> {
        self.parse_config(ingress, resolver).map(ModuleConfig::DefaultBackend)
    }
}
