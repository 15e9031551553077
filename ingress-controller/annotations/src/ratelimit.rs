//! Connection and request rate limiting.
//!
//! Each of the three limit dimensions (concurrent connections, requests per
//! second, requests per minute) becomes a [`Zone`] whose burst is the limit
//! scaled by a shared multiplier. A limit of zero leaves the dimension out.

use crate::{IngressAnnotation, ModuleConfig};
use ingress_controller_core::{
    validate, AnnotationField, Annotations, Definitions, IpNet, Resolver, Result, Risk, Scope,
    Settings, ValidationError, Validator,
};
use ingress_controller_k8s_api::{Ingress, ResourceExt};
use tracing::debug;

pub const LIMIT_CONNECTIONS: &str = "limit-connections";
pub const LIMIT_RPS: &str = "limit-rps";
pub const LIMIT_RPM: &str = "limit-rpm";
pub const LIMIT_BURST_MULTIPLIER: &str = "limit-burst-multiplier";
pub const LIMIT_RATE: &str = "limit-rate";
pub const LIMIT_RATE_AFTER: &str = "limit-rate-after";
pub const LIMIT_ALLOWLIST: &str = "limit-allowlist";
pub const LIMIT_WHITELIST: &str = "limit-whitelist";

/// Multiplier applied to each limit when none is configured.
pub const DEFAULT_BURST_MULTIPLIER: i64 = 5;

/// Size, in megabytes, of the shared memory zone backing each limit.
pub const DEFAULT_SHARED_SIZE: i64 = 5;

const fn limit(name: &'static str, documentation: &'static str) -> AnnotationField {
    AnnotationField {
        name,
        aliases: &[],
        validator: Validator::Func(validate::non_negative_int),
        scope: Scope::Location,
        risk: Risk::Low,
        documentation,
    }
}

pub static ANNOTATIONS: Definitions = Definitions {
    fields: &[
        limit(
            LIMIT_CONNECTIONS,
            "Number of concurrent connections allowed from a single IP address",
        ),
        limit(
            LIMIT_RPS,
            "Number of requests accepted from a given IP each second",
        ),
        limit(
            LIMIT_RPM,
            "Number of requests accepted from a given IP each minute",
        ),
        AnnotationField {
            name: LIMIT_BURST_MULTIPLIER,
            aliases: &[],
            validator: Validator::Func(validate::positive_int),
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Multiplier of the limit rate for burst size. Defaults to 5",
        },
        limit(
            LIMIT_RATE,
            "Rate, in kilobytes per second, at which responses are sent to a client",
        ),
        limit(
            LIMIT_RATE_AFTER,
            "Initial number of kilobytes after which responses are rate limited",
        ),
        AnnotationField {
            name: LIMIT_ALLOWLIST,
            aliases: &[LIMIT_WHITELIST],
            validator: Validator::Func(validate::cidr_list),
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Client IP source ranges excluded from rate limiting, as a \
                            comma-separated list of CIDRs",
        },
    ],
};

/// A single rate-limit dimension.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Zone {
    pub name: String,
    pub limit: i64,
    pub burst: i64,
    pub shared_size: i64,
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub connections: Option<Zone>,
    pub rps: Option<Zone>,
    pub rpm: Option<Zone>,
    pub limit_rate: i64,
    pub limit_rate_after: i64,
    pub name: String,

    /// Sorted and deduplicated.
    pub allowlist: Vec<IpNet>,
}

#[derive(Clone, Debug)]
pub struct Parser {
    settings: Settings,
}

// === impl Config ===

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        self.connections == other.connections
            && self.rps == other.rps
            && self.rpm == other.rpm
            && self.limit_rate == other.limit_rate
            && self.limit_rate_after == other.limit_rate_after
            && self.name == other.name
            && self.allowlist == other.allowlist
    }
}

impl Eq for Config {}

// === impl Parser ===

impl Parser {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn parse_config(&self, ingress: &Ingress, resolver: &dyn Resolver) -> Config {
        let anns = Annotations::new(&self.settings, ingress, &ANNOTATIONS);
        let def = resolver.default_backend();

        // Ranges are enforced while parsing, so they hold with validation off.
        let int = |name: &str, check: fn(&str) -> Result<(), ValidationError>, default: i64| {
            anns.get(name, |s| {
                check(s)?;
                s.parse::<i64>().map_err(ValidationError::new)
            })
            .unwrap_or(default)
        };
        let count = |name: &str, default: i64| int(name, validate::non_negative_int, default);
        let multiplier = int(
            LIMIT_BURST_MULTIPLIER,
            validate::positive_int,
            DEFAULT_BURST_MULTIPLIER,
        );

        let mut allowlist = anns
            .get(LIMIT_ALLOWLIST, validate::parse_cidrs)
            .unwrap_or_else(|error| {
                if !error.is_missing_annotations() {
                    debug!(%error, "Using default rate limit allowlist");
                }
                def.limit_allowlist
            });
        allowlist.sort();
        allowlist.dedup();

        let name = format!(
            "{}_{}",
            ingress.namespace().unwrap_or_default(),
            ingress.name_any()
        );
        let zone = |suffix: &str, limit: i64| {
            (limit > 0).then(|| Zone {
                name: format!("{name}_{suffix}"),
                limit,
                burst: limit.saturating_mul(multiplier),
                shared_size: DEFAULT_SHARED_SIZE,
            })
        };

        Config {
            connections: zone("conn", count(LIMIT_CONNECTIONS, 0)),
            rps: zone("rps", count(LIMIT_RPS, 0)),
            rpm: zone("rpm", count(LIMIT_RPM, 0)),
            limit_rate: count(LIMIT_RATE, def.limit_rate),
            limit_rate_after: count(LIMIT_RATE_AFTER, def.limit_rate_after),
            name,
            allowlist,
        }
    }
}

impl IngressAnnotation for Parser {
    fn name(&self) -> &'static str {
        "ratelimit"
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn documentation(&self) -> &'static Definitions {
        &ANNOTATIONS
    }

    fn parse(&self, ingress: &Ingress, resolver: &dyn Resolver) -> Result<ModuleConfig> {
        Ok(ModuleConfig::RateLimit(self.parse_config(ingress, resolver)))
    }
}
