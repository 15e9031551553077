use super::*;
use crate::backend_protocol::{self, Parser, Protocol};

fn parse(value: Option<&str>) -> Protocol {
    let annotations = value
        .map(|v| vec![(backend_protocol::BACKEND_PROTOCOL, v)])
        .unwrap_or_default();
    let ing = mk_ingress("foo", &annotations);
    Parser::new(Settings::default()).parse_protocol(&ing)
}

#[test]
fn table_is_well_formed() {
    backend_protocol::ANNOTATIONS
        .check()
        .expect("backend protocol annotations must be well formed");
}

#[test]
fn defaults_to_http() {
    assert_eq!(parse(None), Protocol::Http);
    assert_eq!(parse(Some("")), Protocol::Http);
    assert_eq!(parse(Some("SOAP")), Protocol::Http);
}

#[test]
fn parses_case_insensitively() {
    let cases = [
        ("HTTP", Protocol::Http),
        ("https", Protocol::Https),
        ("auto_http", Protocol::AutoHttp),
        ("GRPC", Protocol::Grpc),
        ("gRPCs", Protocol::Grpcs),
        ("fcgi", Protocol::Fcgi),
    ];
    for (value, expected) in cases {
        let protocol = parse(Some(value));
        assert_eq!(protocol, expected, "{value:?}");
        assert_eq!(protocol.to_string(), value.to_ascii_uppercase());
    }
}

#[test]
fn unvalidated_values_must_still_parse() {
    let ing = mk_ingress("foo", &[(backend_protocol::BACKEND_PROTOCOL, "SOAP")]);
    let settings = Settings::default().with_validation(false);
    assert_eq!(Parser::new(settings).parse_protocol(&ing), Protocol::Http);
}
