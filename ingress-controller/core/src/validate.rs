//! Reusable annotation value validators.
//!
//! A [`Validator`] is a value stored alongside each annotation definition. All
//! validators are pure predicates over the raw annotation string.

use crate::IpNet;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;
use thiserror::Error;

const DNS_1035_LABEL_REGEX: &str = r"^[a-z]([-a-z0-9]*[a-z0-9])?$";
const DNS_1035_LABEL_MAX_LEN: usize = 63;

static DNS_1035_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(DNS_1035_LABEL_REGEX).expect("should compile"));

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(String);

#[derive(Copy, Clone, Debug)]
pub enum Validator {
    /// Accepts any value.
    Any,

    /// The value must be one of `values`. The empty string is accepted only
    /// when `allow_empty` is set.
    Options {
        values: &'static [&'static str],
        case_insensitive: bool,
        allow_empty: bool,
    },

    /// The value must contain a match for `regex`. Matching is unanchored;
    /// patterns that must cover the whole value carry their own `^...$`.
    Regex {
        regex: &'static Lazy<Regex>,
        allow_empty: bool,
    },

    /// The value is a comma-separated list whose trimmed elements must each
    /// be one of `values`.
    List { values: &'static [&'static str] },

    /// A free-form predicate.
    Func(fn(&str) -> Result<(), ValidationError>),
}

// === impl ValidationError ===

impl ValidationError {
    pub fn new(reason: impl ToString) -> Self {
        Self(reason.to_string())
    }
}

// === impl Validator ===

impl Validator {
    pub fn validate(&self, value: &str) -> Result<(), ValidationError> {
        match *self {
            Self::Any => Ok(()),

            Self::Options {
                values,
                case_insensitive,
                allow_empty,
            } => {
                if value.is_empty() {
                    return empty(allow_empty);
                }
                let found = values.iter().any(|v| {
                    if case_insensitive {
                        v.eq_ignore_ascii_case(value)
                    } else {
                        *v == value
                    }
                });
                if !found {
                    return Err(ValidationError(format!(
                        "value {value:?} is not one of: {}",
                        values.join(", ")
                    )));
                }
                Ok(())
            }

            Self::Regex { regex, allow_empty } => {
                if value.is_empty() {
                    return empty(allow_empty);
                }
                if !regex.is_match(value) {
                    return Err(ValidationError(format!(
                        "value {value:?} does not match {}",
                        regex.as_str()
                    )));
                }
                Ok(())
            }

            Self::List { values } => {
                for item in value.split(',').map(str::trim) {
                    if !values.contains(&item) {
                        return Err(ValidationError(format!("unknown value {item:?}")));
                    }
                }
                Ok(())
            }

            Self::Func(f) => f(value),
        }
    }
}

fn empty(allow_empty: bool) -> Result<(), ValidationError> {
    if allow_empty {
        Ok(())
    } else {
        Err(ValidationError::new("value cannot be empty"))
    }
}

/// Accepts integers greater than zero.
pub fn positive_int(s: &str) -> Result<(), ValidationError> {
    let i = s.parse::<i64>().map_err(ValidationError::new)?;
    if i <= 0 {
        return Err(ValidationError::new("value should be positive integer"));
    }
    Ok(())
}

/// Accepts integers greater than or equal to zero.
pub fn non_negative_int(s: &str) -> Result<(), ValidationError> {
    let i = s.parse::<i64>().map_err(ValidationError::new)?;
    if i < 0 {
        return Err(ValidationError::new("value should not be negative"));
    }
    Ok(())
}

/// Accepts a non-empty, comma-separated list of IP addresses and CIDR blocks.
pub fn cidr_list(s: &str) -> Result<(), ValidationError> {
    if s.is_empty() {
        return Err(ValidationError::new("value cannot be empty"));
    }
    parse_cidrs(s).map(|_| ())
}

/// Accepts a Kubernetes Service name (an RFC 1035 DNS label).
pub fn service_name(s: &str) -> Result<(), ValidationError> {
    if s.len() > DNS_1035_LABEL_MAX_LEN {
        return Err(ValidationError(format!(
            "service name must be no more than {DNS_1035_LABEL_MAX_LEN} characters"
        )));
    }
    if !DNS_1035_LABEL.is_match(s) {
        return Err(ValidationError(format!(
            "service name {s:?} must match the regex: {DNS_1035_LABEL_REGEX}"
        )));
    }
    Ok(())
}

/// Parses a single IP address or CIDR block.
///
/// A bare address becomes a single-address network. Host bits in a CIDR block
/// are cleared, so `10.1.2.3/8` parses as `10.0.0.0/8`.
pub fn parse_cidr(s: &str) -> Result<IpNet, ValidationError> {
    if s.contains('/') {
        let net = s
            .parse::<IpNet>()
            .map_err(|_| ValidationError(format!("invalid CIDR address: {s:?}")))?;
        return Ok(net.trunc());
    }
    let addr = s
        .parse::<IpAddr>()
        .map_err(|_| ValidationError(format!("invalid IP address: {s:?}")))?;
    Ok(IpNet::from(addr))
}

/// Parses a comma-separated list of IP addresses and CIDR blocks, trimming
/// each element. Any invalid element fails the whole list.
pub fn parse_cidrs(s: &str) -> Result<Vec<IpNet>, ValidationError> {
    s.split(',').map(|item| parse_cidr(item.trim())).collect()
}
