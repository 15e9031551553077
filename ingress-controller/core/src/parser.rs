//! Reads typed values out of an Ingress' annotations.
//!
//! Each lookup resolves a definition's canonical key first and then its
//! aliases, in declared order. The first present value that passes the
//! definition's validator (and parses as the requested type) wins. When no
//! candidate is present the lookup fails with [`Error::MissingAnnotations`];
//! when candidates are present but none is usable it fails with the
//! [`Error::InvalidValue`] of the highest-precedence key. Modules decide
//! whether to fall back to a default or surface the error.

use crate::{validate::ValidationError, Definitions, Error, Result, DEFAULT_ANNOTATIONS_PREFIX};
use ingress_controller_k8s_api::{Ingress, ResourceExt};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

/// Engine-wide extraction settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    prefix: Arc<str>,
    validate: bool,
}

/// A view over an Ingress' annotations through one module's definitions.
#[derive(Copy, Clone, Debug)]
pub struct Annotations<'a> {
    settings: &'a Settings,
    values: &'a BTreeMap<String, String>,
    definitions: &'a Definitions,
}

// === impl Settings ===

impl Default for Settings {
    fn default() -> Self {
        Self::new(DEFAULT_ANNOTATIONS_PREFIX)
    }
}

impl Settings {
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: prefix.as_ref().trim_end_matches('/').into(),
            validate: true,
        }
    }

    /// Controls whether validators run during extraction. Values must still
    /// parse as the requested type.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn validates(&self) -> bool {
        self.validate
    }

    /// Returns the fully-qualified key for an unprefixed annotation name.
    pub fn key(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }

    /// Returns the unprefixed name of `key`, if it carries this prefix.
    pub fn strip_prefix<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(&*self.prefix)?.strip_prefix('/')
    }
}

// === impl Annotations ===

impl<'a> Annotations<'a> {
    pub fn new(settings: &'a Settings, ingress: &'a Ingress, definitions: &'a Definitions) -> Self {
        Self::from_map(settings, ingress.annotations(), definitions)
    }

    pub fn from_map(
        settings: &'a Settings,
        values: &'a BTreeMap<String, String>,
        definitions: &'a Definitions,
    ) -> Self {
        Self {
            settings,
            values,
            definitions,
        }
    }

    /// Returns the trimmed value of an annotation, unvalidated and without
    /// alias resolution.
    pub fn raw(&self, name: &str) -> Option<&'a str> {
        self.values
            .get(&self.settings.key(name))
            .map(|v| v.trim())
    }

    pub fn string(&self, name: &str) -> Result<String> {
        self.get(name, |s| Ok(s.to_string()))
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        self.get(name, |s| s.parse::<i64>().map_err(ValidationError::new))
    }

    /// Splits a comma-separated annotation into trimmed elements.
    pub fn list(&self, name: &str) -> Result<Vec<String>> {
        self.get(name, |s| Ok(s.split(',').map(|v| v.trim().to_string()).collect()))
    }

    /// Looks up `name` and its aliases, returning the first candidate that
    /// validates and parses.
    ///
    /// Values are trimmed before validation. A blank value is never usable,
    /// so its field falls back like any other invalid annotation.
    pub fn get<T>(
        &self,
        name: &str,
        parse: impl Fn(&str) -> Result<T, ValidationError>,
    ) -> Result<T> {
        let field = self.definitions.get(name);
        let aliases = field.map(|f| f.aliases).unwrap_or_default();

        let mut invalid = None;
        for candidate in std::iter::once(&name).chain(aliases) {
            let key = self.settings.key(candidate);
            let Some(value) = self.values.get(&key).map(|v| v.trim()) else {
                continue;
            };
            if value.is_empty() {
                debug!(annotation = %key, "Ignoring empty annotation");
                if invalid.is_none() {
                    invalid = Some(Error::invalid(key, "value is empty"));
                }
                continue;
            }

            let parsed = field
                .filter(|_| self.settings.validate)
                .map(|f| f.validator.validate(value))
                .unwrap_or(Ok(()))
                .and_then(|()| parse(value));
            match parsed {
                Ok(v) => return Ok(v),
                Err(error) => {
                    debug!(annotation = %key, %value, %error, "Ignoring invalid annotation");
                    if invalid.is_none() {
                        invalid = Some(Error::invalid(key, error));
                    }
                }
            }
        }

        Err(invalid.unwrap_or(Error::MissingAnnotations))
    }
}
