//! Tests for the intake decoders

use super::*;

#[test]
fn test_kind_round_trip() {
    for name in ["auto", "json", "raw", "cri", "postgres"] {
        let kind: DecoderKind = name.parse().unwrap();
        assert_eq!(kind.as_str(), name);
    }
}

#[test]
fn test_kind_unknown() {
    let err = "protobuf".parse::<DecoderKind>().unwrap_err();
    assert!(err.to_string().contains("protobuf"));
}

#[test]
fn test_json_object() {
    let root = decode_json(br#"{"log":"x","stream":"A"}"#).unwrap();
    assert_eq!(root["log"], "x");
    assert_eq!(root["stream"], "A");
}

#[test]
fn test_json_invalid() {
    assert!(decode_json(b"not json").is_err());
}

#[test]
fn test_raw_drops_record_terminator() {
    let root = decode_raw(b"hello world\n");
    assert_eq!(root["message"], "hello world");

    // only the final byte goes, even with more newlines before it
    let root = decode_raw(b"hello\n\n");
    assert_eq!(root["message"], "hello\n");
}

#[test]
fn test_raw_trim_is_unconditional() {
    // records always arrive terminated, so the last byte is dropped
    // whatever it is
    let root = decode_raw(b"plain");
    assert_eq!(root["message"], "plai");

    let root = decode_raw(b"");
    assert_eq!(root["message"], "");
}

#[test]
fn test_cri_full_line() {
    let root =
        decode_cri(b"2016-10-06T00:17:09.669794202Z stdout F message with spaces\n").unwrap();
    assert_eq!(root["time"], "2016-10-06T00:17:09.669794202Z");
    assert_eq!(root["stream"], "stdout");
    assert_eq!(root["log"], "message with spaces");
}

#[test]
fn test_cri_partial_tag() {
    let root = decode_cri(b"2016-10-06T00:17:09.669794202Z stderr P partial").unwrap();
    assert_eq!(root["stream"], "stderr");
    assert_eq!(root["log"], "partial");
}

#[test]
fn test_cri_rejects_bad_stream() {
    assert!(decode_cri(b"2016-10-06T00:17:09Z stdin F x").is_err());
}

#[test]
fn test_cri_rejects_truncated() {
    assert!(decode_cri(b"2016-10-06T00:17:09Z stdout").is_err());
}

#[test]
fn test_postgres_statement_line() {
    let line = b"2021-06-22 16:24:27.460 GMT [7291] => [3-1] statement: select 1;";
    let root = decode_postgres(line).unwrap();
    assert_eq!(root["time"], "2021-06-22 16:24:27.460 GMT");
    assert_eq!(root["pid"], "7291");
    assert_eq!(root["pid_message_number"], "3-1");
    assert_eq!(root["log"], "statement: select 1;");
}

#[test]
fn test_postgres_rejects_garbage() {
    assert!(decode_postgres(b"not a postgres line").is_err());
}

#[test]
fn test_dispatch_rejects_unresolved_auto() {
    assert!(decode(DecoderKind::Auto, b"{}").is_err());
}

#[test]
fn test_dispatch_concrete() {
    let root = decode(DecoderKind::Json, br#"{"a":1}"#).unwrap();
    assert_eq!(root["a"], 1);

    let root = decode(DecoderKind::Raw, b"x\n").unwrap();
    assert_eq!(root["message"], "x");
}
