use crate::{Error, Result, Risk, Validator};

/// Where in the proxy configuration hierarchy an annotation's value applies.
///
/// Placement only; extraction does not depend on it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Location,
    Server,
    Ingress,
    Certificate,
}

/// Describes a single annotation understood by a module.
#[derive(Clone, Debug)]
pub struct AnnotationField {
    /// The canonical, unprefixed annotation name.
    pub name: &'static str,

    /// Deprecated or alternate names, in precedence order. The canonical name
    /// always wins over any alias.
    pub aliases: &'static [&'static str],

    pub validator: Validator,
    pub scope: Scope,
    pub risk: Risk,
    pub documentation: &'static str,
}

/// A module's static table of annotation definitions.
///
/// Tables are declared as `static` items and never change at runtime, so they
/// may be shared freely between concurrent extractions.
#[derive(Debug)]
pub struct Definitions {
    pub fields: &'static [AnnotationField],
}

// === impl Scope ===

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Server => "server",
            Self::Ingress => "ingress",
            Self::Certificate => "certificate",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl AnnotationField ===

impl AnnotationField {
    /// Indicates whether `key` names this field, either canonically or by alias.
    #[inline]
    pub fn matches(&self, key: &str) -> bool {
        self.name == key || self.aliases.contains(&key)
    }
}

// === impl Definitions ===

impl Definitions {
    pub fn iter(&self) -> impl Iterator<Item = &'static AnnotationField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a field by its canonical name only.
    pub fn get(&self, name: &str) -> Option<&'static AnnotationField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up the field an unprefixed key refers to, by canonical name or
    /// alias.
    ///
    /// A key claimed by more than one field indicates a malformed table and is
    /// reported as [`Error::AmbiguousAlias`].
    pub fn resolve(&self, key: &str) -> Result<Option<&'static AnnotationField>> {
        let mut matched = self.fields.iter().filter(|f| f.matches(key));
        let field = matched.next();
        if matched.next().is_some() {
            return Err(Error::AmbiguousAlias {
                key: key.to_string(),
            });
        }
        Ok(field)
    }

    /// Verifies that every name and alias in the table refers to exactly one
    /// field.
    pub fn check(&self) -> Result<()> {
        for field in self.fields {
            for key in std::iter::once(&field.name).chain(field.aliases) {
                self.resolve(key)?;
            }
            if field.aliases.iter().any(|a| *a == field.name) {
                return Err(Error::AmbiguousAlias {
                    key: field.name.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Definitions {
    type Item = &'static AnnotationField;
    type IntoIter = std::slice::Iter<'static, AnnotationField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
