//! Wallarm WAF node settings.
//!
//! Every field silently falls back to the resolver's default when its
//! annotation is absent or invalid.

use crate::{IngressAnnotation, ModuleConfig};
use ingress_controller_core::{
    validate::{self, ValidationError},
    AnnotationField, Annotations, Definitions, Resolver, Result, Risk, Scope, Settings, Validator,
};
use ingress_controller_k8s_api::Ingress;
use once_cell::sync::Lazy;
use regex::Regex;

pub const MODE: &str = "wallarm-mode";
pub const MODE_ALLOW_OVERRIDE: &str = "wallarm-mode-allow-override";
pub const FALLBACK: &str = "wallarm-fallback";
pub const APPLICATION: &str = "wallarm-application";
pub const INSTANCE: &str = "wallarm-instance";
pub const PARTNER_CLIENT_UUID: &str = "wallarm-partner-client-uuid";
pub const BLOCK_PAGE: &str = "wallarm-block-page";
pub const ACL_BLOCK_PAGE: &str = "wallarm-acl-block-page";
pub const PARSE_RESPONSE: &str = "wallarm-parse-response";
pub const PARSE_WEBSOCKET: &str = "wallarm-parse-websocket";
pub const UNPACK_RESPONSE: &str = "wallarm-unpack-response";
pub const PARSER_DISABLE: &str = "wallarm-parser-disable";

const ON_OFF: Validator = Validator::Options {
    values: &["off", "on"],
    case_insensitive: true,
    allow_empty: true,
};

const PARSERS: &[&str] = &[
    "cookie",
    "zlib",
    "htmljs",
    "json",
    "multipart",
    "base64",
    "percent",
    "urlenc",
    "xml",
    "jwt",
];

const BLOCK_PAGE_TYPES: &[&str] = &["acl_ip", "acl_source", "attack"];

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}\b-[0-9a-fA-F]{4}\b-[0-9a-fA-F]{4}\b-[0-9a-fA-F]{4}\b-[0-9a-fA-F]{12}")
        .expect("should compile")
});

pub static ANNOTATIONS: Definitions = Definitions {
    fields: &[
        AnnotationField {
            name: MODE,
            aliases: &[],
            validator: Validator::Options {
                values: &["off", "monitoring", "safe_blocking", "block"],
                case_insensitive: true,
                allow_empty: true,
            },
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Traffic processing mode",
        },
        AnnotationField {
            name: MODE_ALLOW_OVERRIDE,
            aliases: &[],
            validator: Validator::Options {
                values: &["off", "strict", "on"],
                case_insensitive: true,
                allow_empty: true,
            },
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Whether filtering rules downloaded from the cloud may override the \
                            traffic processing mode",
        },
        AnnotationField {
            name: FALLBACK,
            aliases: &[],
            validator: ON_OFF,
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "When on, the node keeps serving traffic with the module disabled if \
                            its rule databases cannot be loaded",
        },
        AnnotationField {
            name: APPLICATION,
            aliases: &[INSTANCE],
            validator: Validator::Func(validate::positive_int),
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Identifier of the protected application. Must be a positive integer",
        },
        AnnotationField {
            name: PARTNER_CLIENT_UUID,
            aliases: &[],
            validator: Validator::Regex {
                regex: &UUID,
                allow_empty: true,
            },
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Tenant identifier for a multi-tenant node, in UUID format",
        },
        AnnotationField {
            name: BLOCK_PAGE,
            aliases: &[],
            validator: Validator::Func(validate_block_page),
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Page and response code returned for blocked requests, as \
                            `page [response_code=N] [type=t1,t2];...`",
        },
        AnnotationField {
            name: ACL_BLOCK_PAGE,
            aliases: &[],
            validator: Validator::Any,
            scope: Scope::Location,
            // Deprecated and unvalidated.
            risk: Risk::Medium,
            documentation: "Deprecated. Use \"wallarm-block-page\" instead",
        },
        AnnotationField {
            name: PARSE_RESPONSE,
            aliases: &[],
            validator: ON_OFF,
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Whether to analyze application responses",
        },
        AnnotationField {
            name: PARSE_WEBSOCKET,
            aliases: &[],
            validator: ON_OFF,
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Whether to analyze WebSocket messages",
        },
        AnnotationField {
            name: UNPACK_RESPONSE,
            aliases: &[],
            validator: ON_OFF,
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Whether to decompress application responses before analysis",
        },
        AnnotationField {
            name: PARSER_DISABLE,
            aliases: &[],
            validator: Validator::List { values: PARSERS },
            scope: Scope::Location,
            risk: Risk::Low,
            documentation: "Comma-separated list of request parsers to disable",
        },
    ],
};

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub mode: String,
    pub mode_allow_override: String,
    pub fallback: String,
    pub instance: String,
    pub block_page: String,
    pub acl_block_page: String,
    pub parse_response: String,
    pub parse_websocket: String,
    pub unpack_response: String,
    pub parser_disable: Vec<String>,
    pub partner_client_uuid: String,
}

#[derive(Clone, Debug)]
pub struct Parser {
    settings: Settings,
}

/// Validates the block page mini-grammar: `;`-separated entries, each a page
/// (starting with `/`, `&`, `@` or `$`) followed by space-separated
/// `response_code=<int>` or `type=<t>[,<t>...]` parameters.
pub fn validate_block_page(s: &str) -> std::result::Result<(), ValidationError> {
    if s.is_empty() {
        return Ok(());
    }

    for entry in s.split(';') {
        let mut parts = entry.split(' ');
        let page = parts.next().unwrap_or_default();
        if !page.starts_with(['/', '&', '@', '$']) {
            return Err(ValidationError::new(format!(
                "invalid block page format {page:?}"
            )));
        }

        for param in parts {
            let Some((key, value)) = param.split_once('=').filter(|(_, v)| !v.contains('='))
            else {
                return Err(ValidationError::new(format!(
                    "invalid block page optional param format {param:?}"
                )));
            };
            match key {
                "response_code" => {
                    if value.parse::<i64>().is_err() {
                        return Err(ValidationError::new(format!(
                            "invalid response_code value {value:?}"
                        )));
                    }
                }
                "type" => {
                    if let Some(t) = value.split(',').find(|t| !BLOCK_PAGE_TYPES.contains(t)) {
                        return Err(ValidationError::new(format!("invalid type value {t:?}")));
                    }
                }
                _ => {
                    return Err(ValidationError::new(format!(
                        "invalid block page optional param name {key:?}"
                    )))
                }
            }
        }
    }

    Ok(())
}

// === impl Config ===

impl PartialEq for Config {
    fn eq(&self, other: &Self) -> bool {
        self.mode == other.mode
            && self.mode_allow_override == other.mode_allow_override
            && self.fallback == other.fallback
            && self.instance == other.instance
            && self.block_page == other.block_page
            && self.acl_block_page == other.acl_block_page
            && self.parse_response == other.parse_response
            && self.parse_websocket == other.parse_websocket
            && self.unpack_response == other.unpack_response
            && self.parser_disable == other.parser_disable
            && self.partner_client_uuid == other.partner_client_uuid
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
        let mut def = resolver.default_backend();
        let string = |name: &str, default: &mut String| {
            anns.string(name).unwrap_or_else(|_| std::mem::take(default))
        };

        Config {
            mode: string(MODE, &mut def.wallarm_mode),
            mode_allow_override: string(MODE_ALLOW_OVERRIDE, &mut def.wallarm_mode_allow_override),
            fallback: string(FALLBACK, &mut def.wallarm_fallback),
            instance: string(APPLICATION, &mut def.wallarm_instance),
            block_page: string(BLOCK_PAGE, &mut def.wallarm_block_page),
            acl_block_page: string(ACL_BLOCK_PAGE, &mut def.wallarm_acl_block_page),
            parse_response: string(PARSE_RESPONSE, &mut def.wallarm_parse_response),
            parse_websocket: string(PARSE_WEBSOCKET, &mut def.wallarm_parse_websocket),
            unpack_response: string(UNPACK_RESPONSE, &mut def.wallarm_unpack_response),
            partner_client_uuid: string(PARTNER_CLIENT_UUID, &mut def.wallarm_partner_client_uuid),
            parser_disable: anns.list(PARSER_DISABLE).unwrap_or_else(|_| {
                def.wallarm_parser_disable
                    .iter()
                    .map(|p| p.trim().to_string())
                    .collect()
            }),
        }
    }
}

impl IngressAnnotation for Parser {
    fn name(&self) -> &'static str {
        "wallarm"
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn documentation(&self) -> &'static Definitions {
        &ANNOTATIONS
    }

    fn parse(&self, ingress: &Ingress, resolver: &dyn Resolver) -> Result<ModuleConfig> {
        Ok(ModuleConfig::Wallarm(self.parse_config(ingress, resolver)))
    }
}
