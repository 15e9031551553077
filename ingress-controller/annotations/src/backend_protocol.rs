use crate::{IngressAnnotation, ModuleConfig};
use ingress_controller_core::{
    AnnotationField, Annotations, Definitions, Resolver, Result, Risk, Scope, Settings,
    ValidationError, Validator,
};
use ingress_controller_k8s_api::Ingress;
use tracing::debug;

pub const BACKEND_PROTOCOL: &str = "backend-protocol";

pub static ANNOTATIONS: Definitions = Definitions {
    fields: &[AnnotationField {
        name: BACKEND_PROTOCOL,
        aliases: &[],
        validator: Validator::Options {
            values: &["HTTP", "HTTPS", "AUTO_HTTP", "GRPC", "GRPCS", "FCGI"],
            case_insensitive: true,
            allow_empty: false,
        },
        scope: Scope::Location,
        risk: Risk::Low,
        documentation: "Protocol used to talk to the backend. One of HTTP, HTTPS, AUTO_HTTP, \
                        GRPC, GRPCS or FCGI",
    }],
};

/// The protocol used to reach an Ingress' backends.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    #[default]
    Http,
    Https,
    AutoHttp,
    Grpc,
    Grpcs,
    Fcgi,
}

#[derive(Clone, Debug)]
pub struct Parser {
    settings: Settings,
}

// === impl Protocol ===

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
            Self::AutoHttp => "AUTO_HTTP",
            Self::Grpc => "GRPC",
            Self::Grpcs => "GRPCS",
            Self::Fcgi => "FCGI",
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HTTP" => Ok(Self::Http),
            "HTTPS" => Ok(Self::Https),
            "AUTO_HTTP" => Ok(Self::AutoHttp),
            "GRPC" => Ok(Self::Grpc),
            "GRPCS" => Ok(Self::Grpcs),
            "FCGI" => Ok(Self::Fcgi),
            s => Err(format!("invalid backend protocol: {s:?}")),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl Parser ===

impl Parser {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn parse_protocol(&self, ingress: &Ingress) -> Protocol {
        let anns = Annotations::new(&self.settings, ingress, &ANNOTATIONS);
        anns.get(BACKEND_PROTOCOL, |s| {
            s.parse::<Protocol>().map_err(ValidationError::new)
        })
        .unwrap_or_else(|error| {
            if !error.is_missing_annotations() {
                debug!(%error, "Using default backend protocol");
            }
            Protocol::default()
        })
    }
}

impl IngressAnnotation for Parser {
    fn name(&self) -> &'static str {
        "backend-protocol"
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn documentation(&self) -> &'static Definitions {
        &ANNOTATIONS
    }

    fn parse(&self, ingress: &Ingress, _: &dyn Resolver) -> Result<ModuleConfig> {
        Ok(ModuleConfig::BackendProtocol(self.parse_protocol(ingress)))
    }
}
