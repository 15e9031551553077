//! Keeps the extracted annotation configuration of every Ingress.
//!
//! Each update re-extracts the Ingress and compares the result with the
//! stored configuration. Subscribers are notified (by a bumped generation on
//! a watch channel) only when a configuration actually changes, so that a
//! no-op update never triggers a proxy reload.
//!
//! The index also follows Services: when a Service is applied or deleted,
//! the Ingresses in its namespace that select it as their default backend
//! are extracted again.

use crate::{
    annotations::{default_backend, Extractor, IngressConfig},
    k8s::{Ingress, ResourceExt, Service},
    metrics::{IndexMetrics, Reconcile},
    resolver::ClusterResolver,
};
use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use std::{collections::hash_map::Entry, sync::Arc};
use tokio::sync::watch;
use tracing::{debug, info};

pub type SharedIndex = Arc<RwLock<Index>>;

pub struct Index {
    extractor: Arc<Extractor>,
    resolver: ClusterResolver,
    namespaces: HashMap<String, HashMap<String, Indexed>>,
    changes: watch::Sender<u64>,
    metrics: IndexMetrics,
}

/// The latest version of an Ingress with its extracted configuration.
struct Indexed {
    ingress: Ingress,
    config: IngressConfig,
}

// === impl Index ===

impl Index {
    pub fn shared(
        extractor: Arc<Extractor>,
        resolver: ClusterResolver,
        metrics: IndexMetrics,
    ) -> SharedIndex {
        let (changes, _) = watch::channel(0);
        Arc::new(RwLock::new(Self {
            extractor,
            resolver,
            namespaces: HashMap::default(),
            changes,
            metrics,
        }))
    }

    /// Returns a receiver of the index generation, which is incremented every
    /// time an Ingress' configuration changes.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&IngressConfig> {
        let indexed = self.namespaces.get(namespace)?.get(name)?;
        Some(&indexed.config)
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(|names| names.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Extracts and stores `ingress`, returning whether its configuration
    /// differs from what was indexed.
    fn reindex(&mut self, ingress: Ingress) -> bool {
        let config = self.extractor.extract(&ingress, &self.resolver);
        let names = self.namespaces.entry(config.namespace.clone()).or_default();
        match names.entry(config.name.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(Indexed { ingress, config });
                true
            }
            Entry::Occupied(mut entry) => {
                let indexed = entry.get_mut();
                indexed.ingress = ingress;
                if indexed.config == config {
                    return false;
                }
                indexed.config = config;
                true
            }
        }
    }

    /// Extracts again every Ingress in `namespace` whose default backend is
    /// the Service `service`.
    fn reindex_backends(&mut self, namespace: &str, service: &str) {
        let Some(names) = self.namespaces.get(namespace) else {
            return;
        };
        let settings = self.extractor.settings();
        let ingresses = names
            .values()
            .filter(|i| default_backend::service_name(settings, &i.ingress) == Some(service))
            .map(|i| i.ingress.clone())
            .collect::<Vec<_>>();

        let mut changed = false;
        for ingress in ingresses {
            let name = ingress.name_any();
            if self.reindex(ingress) {
                info!(ns = %namespace, %name, %service, "Ingress default backend changed");
                self.metrics.reconciled(Reconcile::Changed);
                changed = true;
            }
        }
        if changed {
            self.notify();
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|generation| *generation += 1);
        let denied = self
            .namespaces
            .values()
            .flat_map(|names| names.values())
            .filter(|i| i.config.is_denied())
            .count();
        self.metrics.set_size(self.len(), denied);
    }
}

impl kubert::index::IndexNamespacedResource<Ingress> for Index {
    fn apply(&mut self, ingress: Ingress) {
        let ns = ingress.namespace().unwrap_or_default();
        let name = ingress.name_any();

        if !self.reindex(ingress) {
            debug!(%ns, %name, "Ingress configuration unchanged");
            self.metrics.reconciled(Reconcile::Unchanged);
            return;
        }

        info!(%ns, %name, "Ingress configuration changed");
        self.metrics.reconciled(Reconcile::Changed);
        self.notify();
    }

    fn delete(&mut self, namespace: String, name: String) {
        let Entry::Occupied(mut names) = self.namespaces.entry(namespace) else {
            return;
        };
        if names.get_mut().remove(&name).is_none() {
            return;
        }
        if names.get().is_empty() {
            names.remove();
        }

        debug!(%name, "Ingress removed");
        self.metrics.reconciled(Reconcile::Removed);
        self.notify();
    }

    // Since apply only reindexes a single Ingress at a time, there's no need
    // to handle resets specially.
}

/// Services are not stored here; the resolver reads them from the
/// [`ServiceIndex`](crate::resolver::ServiceIndex), which must see each
/// update first.
impl kubert::index::IndexNamespacedResource<Service> for Index {
    fn apply(&mut self, svc: Service) {
        let namespace = svc.namespace().expect("Service must have a namespace");
        self.reindex_backends(&namespace, &svc.name_unchecked());
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.reindex_backends(&namespace, &name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{DefaultBackend, SecurityConfiguration, Settings},
        index_chain::IndexChain,
        k8s::{self, ObjectMeta},
        resolver::{ServiceIndex, SharedServices},
    };
    use kubert::index::IndexNamespacedResource;

    fn mk_indexes() -> (SharedIndex, SharedServices) {
        let services = ServiceIndex::shared();
        let resolver = ClusterResolver::new(
            DefaultBackend::default(),
            SecurityConfiguration::default(),
            services.clone(),
        );
        let index = Index::shared(
            Arc::new(Extractor::new(Settings::default())),
            resolver,
            IndexMetrics::default(),
        );
        (index, services)
    }

    fn mk_index() -> SharedIndex {
        mk_indexes().0
    }

    fn mk_service(ns: &str, name: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                namespace: Some(ns.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn backend_of(index: &SharedIndex, name: &str) -> Option<default_backend::Config> {
        index
            .read()
            .get("ns-0", name)
            .and_then(|c| c.default_backend.clone())
    }

    fn mk_ingress(name: &str, annotations: &[(&str, &str)]) -> Ingress {
        let settings = Settings::default();
        k8s::mk_ingress(
            "ns-0",
            name,
            annotations
                .iter()
                .map(|(k, v)| (settings.key(k), v.to_string())),
        )
    }

    #[test]
    fn notifies_only_on_change() {
        let index = mk_index();
        let mut changes = index.read().changes();
        assert_eq!(*changes.borrow_and_update(), 0);

        index.write().apply(mk_ingress("foo", &[("limit-rps", "100")]));
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);
        assert_eq!(index.read().len(), 1);

        // Reapplying the same annotations, or unrelated metadata changes,
        // must not produce an update.
        index.write().apply(mk_ingress("foo", &[("limit-rps", "100")]));
        let mut relabeled = mk_ingress("foo", &[("limit-rps", "100")]);
        relabeled.metadata.labels = Some([("app".to_string(), "foo".to_string())].into());
        index.write().apply(relabeled);
        assert!(!changes.has_changed().unwrap());

        index.write().apply(mk_ingress("foo", &[("limit-rps", "200")]));
        assert_eq!(*changes.borrow_and_update(), 2);
        let rps = index
            .read()
            .get("ns-0", "foo")
            .and_then(|c| c.rate_limit.clone())
            .and_then(|rl| rl.rps)
            .map(|z| z.limit);
        assert_eq!(rps, Some(200));
    }

    #[test]
    fn invalid_values_that_fall_back_are_unchanged() {
        let index = mk_index();
        let mut changes = index.read().changes();

        index.write().apply(mk_ingress("foo", &[]));
        assert_eq!(*changes.borrow_and_update(), 1);

        index.write().apply(mk_ingress("foo", &[("wallarm-mode", "bogus")]));
        assert!(
            !changes.has_changed().unwrap(),
            "an invalid value resolves to the same default"
        );
    }

    #[test]
    fn deletes() {
        let index = mk_index();
        let mut changes = index.read().changes();

        index.write().apply(mk_ingress("foo", &[]));
        index.write().apply(mk_ingress("bar", &[]));
        assert_eq!(*changes.borrow_and_update(), 2);

        <Index as IndexNamespacedResource<Ingress>>::delete(
            &mut index.write(),
            "ns-0".to_string(),
            "missing".to_string(),
        );
        assert!(!changes.has_changed().unwrap());

        <Index as IndexNamespacedResource<Ingress>>::delete(
            &mut index.write(),
            "ns-0".to_string(),
            "foo".to_string(),
        );
        assert_eq!(*changes.borrow_and_update(), 3);
        assert!(index.read().get("ns-0", "foo").is_none());
        assert_eq!(index.read().len(), 1);
    }

    #[test]
    fn denied_ingresses_are_indexed() {
        let index = mk_index();
        index
            .write()
            .apply(mk_ingress("foo", &[("allowlist-source-range", "bogus")]));
        let denied = index.read().get("ns-0", "foo").map(IngressConfig::is_denied);
        assert_eq!(denied, Some(true));
    }

    #[test]
    fn follows_default_backend_services() {
        let (index, services) = mk_indexes();
        let svcs = IndexChain::shared(services, index.clone());
        let mut changes = index.read().changes();

        index
            .write()
            .apply(mk_ingress("foo", &[("default-backend", "demo")]));
        index.write().apply(mk_ingress("bar", &[]));
        assert_eq!(*changes.borrow_and_update(), 2);
        assert_eq!(backend_of(&index, "foo"), None);

        // Services that no Ingress selects leave the index untouched.
        svcs.write().apply(mk_service("ns-0", "other"));
        svcs.write().apply(mk_service("ns-1", "demo"));
        assert!(!changes.has_changed().unwrap());

        svcs.write().apply(mk_service("ns-0", "demo"));
        assert_eq!(*changes.borrow_and_update(), 3);
        assert_eq!(
            backend_of(&index, "foo"),
            Some(default_backend::Config {
                namespace: "ns-0".to_string(),
                name: "demo".to_string(),
            })
        );
        assert_eq!(backend_of(&index, "bar"), None);

        // A resync of the same Service is not a change.
        svcs.write().apply(mk_service("ns-0", "demo"));
        assert!(!changes.has_changed().unwrap());

        <IndexChain<ServiceIndex, Index> as IndexNamespacedResource<Service>>::delete(
            &mut svcs.write(),
            "ns-0".to_string(),
            "demo".to_string(),
        );
        assert_eq!(*changes.borrow_and_update(), 4);
        assert_eq!(backend_of(&index, "foo"), None);
    }

    #[test]
    fn reextracts_the_latest_ingress() {
        let (index, services) = mk_indexes();
        let svcs = IndexChain::shared(services, index.clone());

        index
            .write()
            .apply(mk_ingress("foo", &[("default-backend", "demo")]));
        index
            .write()
            .apply(mk_ingress("foo", &[("default-backend", "other")]));

        // The Ingress no longer selects `demo`.
        svcs.write().apply(mk_service("ns-0", "demo"));
        assert_eq!(backend_of(&index, "foo"), None);

        svcs.write().apply(mk_service("ns-0", "other"));
        assert_eq!(
            backend_of(&index, "foo").map(|b| b.name),
            Some("other".to_string())
        );
    }
}
