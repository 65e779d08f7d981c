//! Tests for body parsing

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_auto_json_object() {
    let value = parse_body(br#"{"items": [1, 2]}"#, ContentHint::Auto).unwrap();
    assert_eq!(value, json!({"items": [1, 2]}));
}

#[test]
fn test_auto_json_array() {
    let value = parse_body(b"[{\"id\": 1}]", ContentHint::Auto).unwrap();
    assert_eq!(value, json!([{"id": 1}]));
}

#[test]
fn test_auto_jsonl() {
    let body = b"{\"id\": 1}\n{\"id\": 2}\n";
    let value = parse_body(body, ContentHint::Auto).unwrap();
    assert_eq!(value, json!([{"id": 1}, {"id": 2}]));
}

#[test]
fn test_auto_csv() {
    let body = b"id,name,active\n1,Alice,true\n2,Bob,false\n";
    let value = parse_body(body, ContentHint::Auto).unwrap();
    assert_eq!(
        value,
        json!([
            {"id": 1, "name": "Alice", "active": true},
            {"id": 2, "name": "Bob", "active": false}
        ])
    );
}

#[test]
fn test_auto_html_stays_string() {
    let body = b"<!DOCTYPE html><html><body>nope</body></html>";
    let value = parse_body(body, ContentHint::Auto).unwrap();
    assert!(value.is_string());
    assert!(value.as_str().unwrap().starts_with("<!DOCTYPE html"));
}

#[test]
fn test_auto_empty_is_null() {
    assert_eq!(parse_body(b"", ContentHint::Auto).unwrap(), json!(null));
    assert_eq!(parse_body(b"  \n ", ContentHint::Auto).unwrap(), json!(null));
}

#[test]
fn test_csv_quoted_fields() {
    let body = b"name,note\n\"Smith, Jane\",\"said \"\"hi\"\"\"\n";
    let value = parse_body(body, ContentHint::Csv).unwrap();
    assert_eq!(
        value,
        json!([{"name": "Smith, Jane", "note": "said \"hi\""}])
    );
}

#[test]
fn test_explicit_text_hint() {
    let value = parse_body(b"{\"not\": \"parsed\"}", ContentHint::Text).unwrap();
    assert_eq!(value, json!("{\"not\": \"parsed\"}"));
}

#[test]
fn test_invalid_json_with_json_hint_errors() {
    assert!(parse_body(b"not json", ContentHint::Json).is_err());
}
