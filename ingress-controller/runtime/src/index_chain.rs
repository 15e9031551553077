use kubert::index::IndexNamespacedResource;
use parking_lot::RwLock;
use std::sync::Arc;

/// Feeds a single resource watch to two indexes, always updating `first`
/// before `then` so that the second index can read what the first stored.
pub struct IndexChain<A, B> {
    first: Arc<RwLock<A>>,
    then: Arc<RwLock<B>>,
}

// === impl IndexChain ===

impl<A, B> IndexChain<A, B> {
    pub fn shared(first: Arc<RwLock<A>>, then: Arc<RwLock<B>>) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(Self { first, then }))
    }
}

impl<A, B, R> IndexNamespacedResource<R> for IndexChain<A, B>
where
    A: IndexNamespacedResource<R>,
    B: IndexNamespacedResource<R>,
    R: Clone,
{
    fn apply(&mut self, resource: R) {
        self.first.write().apply(resource.clone());
        self.then.write().apply(resource);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.first.write().delete(namespace.clone(), name.clone());
        self.then.write().delete(namespace, name);
    }
}
