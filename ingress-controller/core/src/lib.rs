//! Annotation extraction and validation engine.
//!
//! An Ingress carries free-form string annotations. Each annotation module
//! (rate limiting, WAF integration, backend protocol, ...) declares a static
//! table of [`AnnotationField`]s describing the keys it understands: their
//! aliases, validators, placement scope, and security [`Risk`]. The [`parser`]
//! resolves keys against that table, and the [`risk`] gate rejects annotation
//! maps whose keys exceed the cluster's configured risk level.
//!
//! ```text
//! [ Ingress annotations ] -> [ Risk gate ] -> [ Parser (per module) ] -> [ typed Config ]
//!                                                    ^
//!                                             [ Resolver defaults ]
//! ```
//!
//! Everything in this crate is pure: no I/O and no shared mutable state.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod definition;
mod error;
pub mod parser;
pub mod resolver;
pub mod risk;
pub mod validate;

pub use self::{
    definition::{AnnotationField, Definitions, Scope},
    error::{Error, Result},
    parser::{Annotations, Settings},
    resolver::{DefaultBackend, Resolver, SecurityConfiguration},
    risk::Risk,
    validate::{ValidationError, Validator},
};
pub use ipnet::{IpNet, Ipv4Net, Ipv6Net};

/// The annotation prefix used when none is configured.
pub const DEFAULT_ANNOTATIONS_PREFIX: &str = "nginx.ingress.kubernetes.io";
