use crate::{
    core::{DefaultBackend, Resolver, SecurityConfiguration},
    k8s::{ResourceExt, Service},
};
use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use std::sync::Arc;

pub type SharedServices = Arc<RwLock<ServiceIndex>>;

/// Indexes the cluster's Services by namespace and name.
#[derive(Debug, Default)]
pub struct ServiceIndex {
    namespaces: HashMap<String, HashMap<String, Service>>,
}

/// Resolves annotation defaults from process configuration and Services from
/// the cluster.
#[derive(Clone, Debug)]
pub struct ClusterResolver {
    defaults: Arc<DefaultBackend>,
    security: SecurityConfiguration,
    services: SharedServices,
}

// === impl ServiceIndex ===

impl ServiceIndex {
    pub fn shared() -> SharedServices {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&Service> {
        self.namespaces.get(namespace)?.get(name)
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(|services| services.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

impl kubert::index::IndexNamespacedResource<Service> for ServiceIndex {
    fn apply(&mut self, svc: Service) {
        let namespace = svc.namespace().expect("Service must have a namespace");
        let name = svc.name_unchecked();
        tracing::trace!(%namespace, %name, "Indexing service");
        self.namespaces
            .entry(namespace)
            .or_default()
            .insert(name, svc);
    }

    fn delete(&mut self, namespace: String, name: String) {
        if let Some(services) = self.namespaces.get_mut(&namespace) {
            services.remove(&name);
            if services.is_empty() {
                self.namespaces.remove(&namespace);
            }
        }
    }
}

// === impl ClusterResolver ===

impl ClusterResolver {
    pub fn new(
        defaults: DefaultBackend,
        security: SecurityConfiguration,
        services: SharedServices,
    ) -> Self {
        Self {
            defaults: Arc::new(defaults),
            security,
            services,
        }
    }

    pub fn services(&self) -> &SharedServices {
        &self.services
    }
}

impl Resolver for ClusterResolver {
    fn default_backend(&self) -> DefaultBackend {
        (*self.defaults).clone()
    }

    fn security_configuration(&self) -> SecurityConfiguration {
        self.security.clone()
    }

    fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.services.read().get(namespace, name).cloned()
    }
}
