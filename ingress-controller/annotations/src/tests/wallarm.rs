use super::*;
use crate::wallarm::{self, validate_block_page, Config, Parser};
use ingress_controller_core::DefaultBackend;

fn mk_resolver() -> resolver::Mock {
    resolver::Mock {
        default_backend: DefaultBackend {
            wallarm_mode: "off".to_string(),
            wallarm_mode_allow_override: "on".to_string(),
            wallarm_fallback: "on".to_string(),
            wallarm_parse_response: "on".to_string(),
            wallarm_parse_websocket: "off".to_string(),
            wallarm_unpack_response: "on".to_string(),
            ..Default::default()
        },
        ..mock_resolver()
    }
}

fn defaults() -> Config {
    Config {
        mode: "off".to_string(),
        mode_allow_override: "on".to_string(),
        fallback: "on".to_string(),
        parse_response: "on".to_string(),
        parse_websocket: "off".to_string(),
        unpack_response: "on".to_string(),
        ..Default::default()
    }
}

fn all_annotations() -> Vec<(&'static str, &'static str)> {
    vec![
        (wallarm::MODE, "monitoring"),
        (wallarm::MODE_ALLOW_OVERRIDE, "strict"),
        (wallarm::FALLBACK, "off"),
        (wallarm::INSTANCE, "42"),
        (
            wallarm::PARTNER_CLIENT_UUID,
            "11111111-1111-1111-1111-111111111111",
        ),
        (wallarm::BLOCK_PAGE, "/blocked.html response_code=445"),
        (wallarm::ACL_BLOCK_PAGE, "block"),
        (wallarm::PARSE_RESPONSE, "off"),
        (wallarm::PARSE_WEBSOCKET, "on"),
        (wallarm::UNPACK_RESPONSE, "off"),
        (wallarm::PARSER_DISABLE, "xml"),
    ]
}

#[test]
fn table_is_well_formed() {
    wallarm::ANNOTATIONS
        .check()
        .expect("wallarm annotations must be well formed");
    assert_eq!(wallarm::ANNOTATIONS.len(), 11);
}

#[test]
fn parses_annotations() {
    let _tracing = init_tracing();
    let ing = mk_ingress("foo", &all_annotations());
    let config = Parser::new(Settings::default()).parse_config(&ing, &mk_resolver());

    assert_eq!(
        config,
        Config {
            mode: "monitoring".to_string(),
            mode_allow_override: "strict".to_string(),
            fallback: "off".to_string(),
            instance: "42".to_string(),
            block_page: "/blocked.html response_code=445".to_string(),
            acl_block_page: "block".to_string(),
            parse_response: "off".to_string(),
            parse_websocket: "on".to_string(),
            unpack_response: "off".to_string(),
            parser_disable: vec!["xml".to_string()],
            partner_client_uuid: "11111111-1111-1111-1111-111111111111".to_string(),
        }
    );
}

#[test]
fn defaults_without_annotations() {
    let ing = mk_ingress("foo", &[]);
    let config = Parser::new(Settings::default()).parse_config(&ing, &mk_resolver());
    assert_eq!(config, defaults());
    assert!(config.parser_disable.is_empty());
}

#[test]
fn invalid_values_fall_back_to_defaults() {
    let _tracing = init_tracing();
    let ing = mk_ingress(
        "foo",
        &[
            (wallarm::MODE, "aggressive"),
            (wallarm::FALLBACK, "maybe"),
            (wallarm::APPLICATION, "-1"),
            (wallarm::PARTNER_CLIENT_UUID, "not-a-uuid"),
            (wallarm::BLOCK_PAGE, "block"),
            (wallarm::PARSER_DISABLE, "xml,yaml"),
        ],
    );
    let mut resolver = mk_resolver();
    resolver.default_backend.wallarm_parser_disable = vec![" json".to_string(), "xml ".to_string()];

    let config = Parser::new(Settings::default()).parse_config(&ing, &resolver);
    assert_eq!(
        config,
        Config {
            parser_disable: vec!["json".to_string(), "xml".to_string()],
            ..defaults()
        }
    );
}

#[test]
fn blank_values_use_defaults() {
    let ing = mk_ingress(
        "foo",
        &[
            (wallarm::BLOCK_PAGE, ""),
            (wallarm::MODE, ""),
            (wallarm::FALLBACK, "  "),
            (wallarm::PARSER_DISABLE, ""),
        ],
    );
    let mut resolver = mk_resolver();
    resolver.default_backend.wallarm_block_page = "/default.html".to_string();
    resolver.default_backend.wallarm_mode = "block".to_string();
    resolver.default_backend.wallarm_parser_disable = vec!["json".to_string()];

    for settings in [Settings::default(), Settings::default().with_validation(false)] {
        let config = Parser::new(settings).parse_config(&ing, &resolver);
        assert_eq!(config.block_page, "/default.html");
        assert_eq!(config.mode, "block");
        assert_eq!(config.fallback, "on");
        assert_eq!(config.parser_disable, vec!["json"]);
    }
}

#[test]
fn values_are_trimmed() {
    let ing = mk_ingress(
        "foo",
        &[(wallarm::MODE, " block"), (wallarm::BLOCK_PAGE, "/url response_code=420 ")],
    );
    let config = Parser::new(Settings::default()).parse_config(&ing, &mk_resolver());
    assert_eq!(config.mode, "block");
    assert_eq!(config.block_page, "/url response_code=420");
}

#[test]
fn unvalidated_values_are_kept() {
    let ing = mk_ingress(
        "foo",
        &[(wallarm::MODE, "aggressive"), (wallarm::BLOCK_PAGE, "block")],
    );
    let settings = Settings::default().with_validation(false);
    let config = Parser::new(settings).parse_config(&ing, &mk_resolver());
    assert_eq!(config.mode, "aggressive");
    assert_eq!(config.block_page, "block");
}

#[test]
fn modes_are_case_insensitive() {
    for mode in ["off", "Monitoring", "SAFE_BLOCKING", "block"] {
        let ing = mk_ingress("foo", &[(wallarm::MODE, mode)]);
        let config = Parser::new(Settings::default()).parse_config(&ing, &mk_resolver());
        assert_eq!(config.mode, mode);
    }
}

#[test]
fn application_wins_over_instance() {
    let ing = mk_ingress(
        "foo",
        &[(wallarm::INSTANCE, "7"), (wallarm::APPLICATION, "12")],
    );
    let config = Parser::new(Settings::default()).parse_config(&ing, &mk_resolver());
    assert_eq!(config.instance, "12");

    let ing = mk_ingress("foo", &[(wallarm::INSTANCE, "7")]);
    let config = Parser::new(Settings::default()).parse_config(&ing, &mk_resolver());
    assert_eq!(config.instance, "7");
}

#[test]
fn parser_disable_list_is_trimmed() {
    let ing = mk_ingress("foo", &[(wallarm::PARSER_DISABLE, "json, xml ,jwt")]);
    let config = Parser::new(Settings::default()).parse_config(&ing, &mk_resolver());
    assert_eq!(config.parser_disable, vec!["json", "xml", "jwt"]);
}

#[test]
fn block_page_grammar() {
    let cases = [
        ("", true),
        ("&/<PATH_TO_FILE/HTML_HTM_FILE_NAME", true),
        ("/url", true),
        ("@namedLocation", true),
        ("&variable", true),
        ("$variable", true),
        ("hello/world.html", false),
        ("/url response_code=420", true),
        ("/url response_code=forbidden", false),
        ("/url response-code=420", false),
        ("/url response_code 420", false),
        ("/url type=attack", true),
        ("/url type=attack,acl_ip", true),
        ("/url type=acl_source,attack,acl_ip", true),
        ("/url type=attack acl_ip", false),
        ("/url type=attack,acl", false),
        ("/url type attack,acl_ip", false),
        ("/url type=acl_source,attack,acl_ip response_code=420", true),
        (
            "/url type=acl_source,attack,acl_ip response_code=420;@namedLocation",
            true,
        ),
        (
            "/url type=acl_source,attack,acl_ip response_code=420,@namedLocation",
            false,
        ),
        (
            "/url type=acl_source,attack,acl_ip response_code=420 @namedLocation",
            false,
        ),
        ("/url response_code=420=1", false),
        ("/url;", false),
    ];

    for (value, valid) in cases {
        assert_eq!(
            validate_block_page(value).is_ok(),
            valid,
            "{value:?} should be {}",
            if valid { "valid" } else { "invalid" }
        );
    }
}

#[test]
fn block_page_errors_name_the_token() {
    let err = validate_block_page("/url type=attack,acl").unwrap_err();
    assert!(err.to_string().contains("\"acl\""), "{err}");

    let err = validate_block_page("hello/world.html").unwrap_err();
    assert!(err.to_string().contains("hello/world.html"), "{err}");
}

#[test]
fn acl_block_page_is_medium_risk() {
    let field = wallarm::ANNOTATIONS
        .get(wallarm::ACL_BLOCK_PAGE)
        .expect("acl block page must be defined");
    assert_eq!(field.risk, ingress_controller_core::Risk::Medium);
}

#[test]
fn equality() {
    let ing = mk_ingress("foo", &all_annotations());
    let parser = Parser::new(Settings::default());
    let a = parser.parse_config(&ing, &mk_resolver());
    let b = parser.parse_config(&ing, &mk_resolver());

    assert_eq!(a, a.clone());
    assert_eq!(a, b);
    assert_eq!(b, a);

    let mut c = b.clone();
    c.parser_disable.push("json".to_string());
    assert_ne!(a, c);
    assert_ne!(c, a);

    let mut d = b.clone();
    d.mode = "block".to_string();
    assert_ne!(a, d);

    let mut reordered = b.clone();
    reordered.parser_disable = vec!["json".to_string(), "xml".to_string()];
    let mut original = b;
    original.parser_disable = vec!["xml".to_string(), "json".to_string()];
    assert_ne!(reordered, original, "lists compare in order");

    assert!(crate::equal::<Config>(None, None));
    assert!(!crate::equal(Some(&a), None));
    assert!(!crate::equal(None, Some(&a)));
    assert!(crate::equal(Some(&a), Some(&a)));
}
