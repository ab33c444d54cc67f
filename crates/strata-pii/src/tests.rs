use proptest::prelude::*;
use serde_json::{Value, json};
use strata_metadata::{MetadataStore, SqliteMetadataStore};
use strata_types::Event;
use test_case::test_case;

use crate::{PiiError, Tokenizer, coerce_text};

fn tokenizer() -> Tokenizer {
    Tokenizer::from_secrets("test-token-secret", "test-encryption-key").unwrap()
}

fn session_event() -> Event {
    Event::from_value(json!({
        "event_id": "s-1",
        "event_type": "session-started",
        "timestamp": "2026-03-01T10:00:00Z",
        "user_id": "u-top",
        "payload": {
            "session_id": "sess-1",
            "user_id": "u-42",
            "ip_address": "203.0.113.7",
            "device_id": null,
            "geo_location": {"latitude": 18.54, "longitude": -72.34, "city": "Port-au-Prince"},
            "platform": "ios"
        }
    }))
    .unwrap()
}

#[test]
fn registered_paths_are_replaced_and_others_pass_through() {
    let t = tokenizer();
    let out = t.tokenize_event(&session_event(), "session-started").unwrap();

    let user = out.get_path("payload.user_id").and_then(Value::as_str).unwrap();
    assert_eq!(user, t.tokenize("user_id", &json!("u-42")).unwrap());
    assert!(user.starts_with("tok_user_id_"));

    let top = out.get("user_id").and_then(Value::as_str).unwrap();
    assert!(top.starts_with("tok_user_id_"));
    assert_ne!(top, user);

    let lat = out.get_path("payload.geo_location.latitude").and_then(Value::as_str).unwrap();
    assert!(lat.starts_with("tok_geo_location.latitude_"));
    assert_eq!(lat, t.tokenize("geo_location.latitude", &json!("18.54")).unwrap());

    assert_eq!(out.get_path("payload.device_id"), Some(&Value::Null));
    assert_eq!(out.get_path("payload.geo_location.city"), Some(&json!("Port-au-Prince")));
    assert_eq!(out.get_path("payload.platform"), Some(&json!("ios")));
    assert_eq!(out.get_path("payload.session_id"), Some(&json!("sess-1")));
    assert_eq!(out.event_id(), Some("s-1"));
}

#[test]
fn input_event_is_not_modified() {
    let original = session_event();
    let _ = tokenizer().tokenize_event(&original, "session-started").unwrap();
    assert_eq!(original, session_event());
}

#[test]
fn global_fields_apply_to_unknown_types() {
    let e = Event::from_value(json!({"event_type": "fraud-alert", "payload": {"email": "a@b.c", "score": 0.9}})).unwrap();
    let out = tokenizer().tokenize_event(&e, "fraud-alert").unwrap();
    assert!(out.get_path("payload.email").and_then(Value::as_str).unwrap().starts_with("tok_email_"));
    assert_eq!(out.get_path("payload.score"), Some(&json!(0.9)));
}

#[test_case(json!("abc"), "abc")]
#[test_case(json!(42), "42")]
#[test_case(json!(true), "true")]
#[test_case(json!(18.5), "18.5")]
fn values_coerce_to_text(value: Value, text: &str) {
    assert_eq!(coerce_text(&value), text);
}

#[test]
fn mappings_are_recorded_once_per_value() {
    let t = tokenizer();
    t.tokenize("user_id", &json!("u-1")).unwrap();
    t.tokenize("user_id", &json!("u-1")).unwrap();
    t.tokenize("user_id", &json!("u-2")).unwrap();

    let at = chrono::Utc::now();
    let mappings = t.take_mappings(at);
    assert_eq!(mappings.len(), 2);
    assert!(t.take_mappings(at).is_empty());

    t.restore_mappings(mappings);
    assert_eq!(t.take_mappings(at).len(), 2);
}

#[test]
fn detokenize_through_the_mapping_store() {
    let t = tokenizer();
    let store = SqliteMetadataStore::in_memory().unwrap();
    let token = t.tokenize("recipient_phone", &json!("+509 3700 0000")).unwrap();
    store.save_token_mappings(&t.take_mappings(chrono::Utc::now())).unwrap();

    assert_eq!(t.detokenize(&token, &store).unwrap().as_deref(), Some("+509 3700 0000"));
    assert_eq!(t.detokenize("tok_user_id_000000000000000000000000", &store).unwrap(), None);
}

#[test]
fn detokenize_with_wrong_key_fails() {
    let store = SqliteMetadataStore::in_memory().unwrap();
    let writer = tokenizer();
    let token = writer.tokenize("email", &json!("a@b.c")).unwrap();
    store.save_token_mappings(&writer.take_mappings(chrono::Utc::now())).unwrap();

    let reader = Tokenizer::from_secrets("test-token-secret", "another-key").unwrap();
    assert!(matches!(
        reader.detokenize(&token, &store),
        Err(PiiError::Undecryptable { .. })
    ));
}

proptest! {
    #[test]
    fn tokens_are_stable_across_instances(value in ".{0,40}") {
        let a = tokenizer().tokenize("phone", &json!(value)).unwrap();
        let b = tokenizer().tokenize("phone", &json!(value)).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn encrypt_decrypt_roundtrip(value in ".{0,64}") {
        let t = tokenizer();
        prop_assert_eq!(t.decrypt(&t.encrypt(&value).unwrap()).unwrap(), value);
    }
}
