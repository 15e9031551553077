use crate::Risk;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// None of the module's annotations are present on the Ingress.
    ///
    /// Callers treat this as "module not configured", not as a misconfiguration.
    #[error("ingress rule without annotations")]
    MissingAnnotations,

    /// A present annotation failed its validator or could not be parsed.
    #[error("annotation {key} contains invalid value: {reason}")]
    InvalidValue { key: String, reason: String },

    /// A present annotation is classified above the permitted risk level.
    #[error("annotation {key} is too risky for environment: risk {risk} exceeds maximum {max}")]
    RiskExceeded { key: String, risk: Risk, max: Risk },

    /// A key is claimed by more than one definition in the same module.
    #[error("annotation {key} is ambiguous: it resolves to more than one definition")]
    AmbiguousAlias { key: String },
}

// === impl Error ===

impl Error {
    pub fn invalid(key: impl ToString, reason: impl ToString) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    #[inline]
    pub fn is_missing_annotations(&self) -> bool {
        matches!(self, Self::MissingAnnotations)
    }

    #[inline]
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, Self::InvalidValue { .. })
    }
}
