use crate::{IpNet, Risk};
use ingress_controller_k8s_api::{ResourceExt, Service};

/// Supplies cluster-wide defaults and security policy to annotation modules.
///
/// Implementations must be cheap to call: modules call them synchronously on
/// every extraction. Zero-valued results are valid and mean "no defaults".
pub trait Resolver: Send + Sync {
    fn default_backend(&self) -> DefaultBackend;

    fn security_configuration(&self) -> SecurityConfiguration;

    /// Looks up a Service by namespace and name.
    fn service(&self, namespace: &str, name: &str) -> Option<Service>;
}

/// Cluster-wide fallback values for annotation modules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DefaultBackend {
    pub wallarm_mode: String,
    pub wallarm_mode_allow_override: String,
    pub wallarm_fallback: String,
    pub wallarm_instance: String,
    pub wallarm_block_page: String,
    pub wallarm_acl_block_page: String,
    pub wallarm_parse_response: String,
    pub wallarm_parse_websocket: String,
    pub wallarm_unpack_response: String,
    pub wallarm_parser_disable: Vec<String>,
    pub wallarm_partner_client_uuid: String,

    /// Bytes per second sent to a client; zero disables the limit.
    pub limit_rate: i64,

    /// Bytes sent before `limit_rate` applies.
    pub limit_rate_after: i64,

    /// Client networks exempt from rate limiting.
    pub limit_allowlist: Vec<IpNet>,

    /// Client networks permitted to reach a location. Empty permits all.
    pub allowlist_source_range: Vec<IpNet>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityConfiguration {
    /// The highest annotation risk level admitted, e.g. `"High"`.
    pub annotations_risk_level: String,
}

/// An in-memory resolver, primarily for tests.
#[derive(Clone, Debug, Default)]
pub struct Mock {
    pub default_backend: DefaultBackend,
    pub security: SecurityConfiguration,
    pub services: Vec<Service>,
}

// === impl SecurityConfiguration ===

impl SecurityConfiguration {
    pub fn max_risk(&self) -> Risk {
        Risk::from_level(&self.annotations_risk_level)
    }
}

// === impl Mock ===

impl Resolver for Mock {
    fn default_backend(&self) -> DefaultBackend {
        self.default_backend.clone()
    }

    fn security_configuration(&self) -> SecurityConfiguration {
        self.security.clone()
    }

    fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.services
            .iter()
            .find(|svc| svc.namespace().as_deref() == Some(namespace) && svc.name_any() == name)
            .cloned()
    }
}
