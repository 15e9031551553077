#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Service, ServiceSpec},
        networking::v1::{Ingress, IngressSpec},
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
pub use kube::{Resource, ResourceExt};

/// Builds an `Ingress` carrying only metadata.
///
/// The annotation engine never reads an Ingress' spec, so this is all that
/// tests and tooling need to exercise it.
pub fn mk_ingress(
    ns: impl ToString,
    name: impl ToString,
    annotations: impl IntoIterator<Item = (String, String)>,
) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            annotations: Some(annotations.into_iter().collect()),
            ..Default::default()
        },
        spec: None,
        status: None,
    }
}
