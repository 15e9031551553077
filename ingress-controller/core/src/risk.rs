//! Security classification of annotations and the admission-time risk gate.

use crate::{parser::Settings, Definitions, Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Ordered security classification of an annotation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Risk {
    Low,
    Medium,
    High,
    Critical,
}

// === impl Risk ===

impl Risk {
    /// Reads a configured risk level, treating anything unrecognized (including
    /// an empty string) as the most restrictive level, `Low`.
    pub fn from_level(level: &str) -> Self {
        level.parse().unwrap_or(Self::Low)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl std::str::FromStr for Risk {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            s => Err(format!("invalid risk level: {s:?}")),
        }
    }
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

/// Rejects an annotation map if any key known to `definitions` (by canonical
/// name or alias) is classified above `max`.
///
/// Keys outside the configured prefix, and keys no definition claims, are
/// ignored. The first violation in key order is returned.
pub fn check_annotation_risk(
    annotations: &BTreeMap<String, String>,
    max: Risk,
    settings: &Settings,
    definitions: &Definitions,
) -> Result<()> {
    for key in annotations.keys() {
        let Some(bare) = settings.strip_prefix(key) else {
            continue;
        };
        let Some(field) = definitions.resolve(bare)? else {
            continue;
        };
        if field.risk > max {
            debug!(annotation = %key, risk = %field.risk, %max, "Annotation exceeds risk level");
            return Err(Error::RiskExceeded {
                key: key.clone(),
                risk: field.risk,
                max,
            });
        }
    }

    Ok(())
}

/// Runs every present annotation known to `definitions` through its
/// validator, failing on the first invalid value. Values are trimmed first,
/// as they are during extraction.
///
/// Unlike extraction, which falls back to defaults, this check is strict. It
/// is intended for admission, where a bad value should be rejected outright.
pub fn check_annotation_values(
    annotations: &BTreeMap<String, String>,
    settings: &Settings,
    definitions: &Definitions,
) -> Result<()> {
    for (key, value) in annotations {
        let Some(bare) = settings.strip_prefix(key) else {
            continue;
        };
        if let Some(field) = definitions.resolve(bare)? {
            field
                .validator
                .validate(value.trim())
                .map_err(|error| Error::invalid(key, error))?;
        }
    }

    Ok(())
}
