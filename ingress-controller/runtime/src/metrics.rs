use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct AdmissionMetrics {
    reviews: Family<ReviewLabels, Counter>,
}

#[derive(Clone, Debug)]
pub struct IndexMetrics {
    reconciles: Family<ReconcileLabels, Counter>,
    denied: Gauge,
    size: Gauge,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Reconcile {
    Changed,
    Unchanged,
    Removed,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReviewLabels {
    result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReconcileLabels {
    outcome: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reviews = Family::default();
        reg.register(
            "reviews",
            "Count of ingress admission reviews by result",
            reviews.clone(),
        );
        Self { reviews }
    }

    pub fn allowed(&self) {
        self.inc("allowed");
    }

    pub fn denied(&self) {
        self.inc("denied");
    }

    pub fn invalid(&self) {
        self.inc("invalid");
    }

    fn inc(&self, result: &'static str) {
        self.reviews.get_or_create(&ReviewLabels { result }).inc();
    }
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::default();
        reg.register(
            "reconciles",
            "Count of ingress reconciliations by outcome",
            reconciles.clone(),
        );

        let size = Gauge::default();
        reg.register(
            "size",
            "Gauge of the number of ingresses in the index",
            size.clone(),
        );

        let denied = Gauge::default();
        reg.register(
            "denied",
            "Gauge of the number of indexed ingresses whose locations are denied",
            denied.clone(),
        );

        Self {
            reconciles,
            denied,
            size,
        }
    }

    pub(crate) fn reconciled(&self, outcome: Reconcile) {
        self.reconciles
            .get_or_create(&ReconcileLabels {
                outcome: outcome.as_str(),
            })
            .inc();
    }

    pub(crate) fn set_size(&self, size: usize, denied: usize) {
        self.size.set(size as i64);
        self.denied.set(denied as i64);
    }
}

impl Default for IndexMetrics {
    /// Unregistered metrics, for tests.
    fn default() -> Self {
        Self::register(&mut Registry::default())
    }
}

// === impl Reconcile ===

impl Reconcile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
            Self::Removed => "removed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn encodes_counters() {
        let mut reg = Registry::default();
        let admission = AdmissionMetrics::register(reg.sub_registry_with_prefix("admission"));
        let index = IndexMetrics::register(reg.sub_registry_with_prefix("index"));

        admission.allowed();
        admission.denied();
        admission.denied();
        index.reconciled(Reconcile::Changed);
        index.set_size(3, 1);

        let mut out = String::new();
        encode(&mut out, &reg).expect("metrics must encode");
        assert!(
            out.contains(r#"admission_reviews_total{result="denied"} 2"#),
            "{out}"
        );
        assert!(
            out.contains(r#"index_reconciles_total{outcome="changed"} 1"#),
            "{out}"
        );
        assert!(out.contains("index_size 3"), "{out}");
        assert!(out.contains("index_denied 1"), "{out}");
    }
}
