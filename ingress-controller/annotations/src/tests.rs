mod backend_protocol;
mod wallarm;

use ingress_controller_core::{resolver, Settings};
use ingress_controller_k8s_api::{self as k8s, Ingress};

/// Builds an Ingress in `ns-0` whose annotations are prefixed with the
/// default prefix.
pub fn mk_ingress(name: &str, annotations: &[(&str, &str)]) -> Ingress {
    let settings = Settings::default();
    k8s::mk_ingress(
        "ns-0",
        name,
        annotations
            .iter()
            .map(|(k, v)| (settings.key(k), v.to_string())),
    )
}

pub fn mk_service(ns: &str, name: &str) -> k8s::Service {
    k8s::Service {
        metadata: k8s::ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn mock_resolver() -> resolver::Mock {
    resolver::Mock::default()
}

pub fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .finish(),
    )
}
