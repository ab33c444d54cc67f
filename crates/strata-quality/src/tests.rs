use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{Value, json};
use strata_types::{Event, ManualClock};
use test_case::test_case;

use crate::{EventSchema, GateConfig, QualityGate};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn gate() -> QualityGate {
    QualityGate::new(GateConfig::default(), Arc::new(ManualClock::new(now())))
}

fn event(v: Value) -> Event {
    Event::from_value(v).unwrap()
}

fn transaction(amount: Value) -> Event {
    event(json!({
        "event_id": "evt-1",
        "event_type": "transaction-initiated",
        "timestamp": "2026-03-01T11:00:00Z",
        "payload": {
            "transaction_id": "tx-1",
            "user_id": "u-1",
            "amount": amount,
            "currency": "USD"
        }
    }))
}

#[test]
fn valid_transaction_is_accepted() {
    let verdict = gate().check(&transaction(json!(100)), None);
    assert!(verdict.accepted(), "{:?}", verdict.reasons);
    assert!(verdict.warnings.is_empty());
}

#[test_case(json!(0), "payload.amount: 0 <= 0")]
#[test_case(json!(-5.5), "payload.amount: -5.5 <= 0")]
#[test_case(json!("0"), "payload.amount: 0 <= 0")]
#[test_case(json!("abc"), "payload.amount: not numeric (abc)")]
fn amount_range_reasons(amount: Value, reason: &str) {
    let verdict = gate().check(&transaction(amount), None);
    assert_eq!(verdict.reasons, vec![reason.to_string()]);
}

#[test]
fn numeric_string_amount_is_accepted() {
    assert!(gate().check(&transaction(json!("12.50")), None).accepted());
}

#[test]
fn reasons_accumulate_without_short_circuit() {
    let e = event(json!({
        "event_id": "r-1",
        "event_type": "remittance-initiated",
        "timestamp": "not a time",
        "payload": {
            "remittance_id": "  ",
            "sender_id": "s-1",
            "send_amount": 0,
            "send_currency": "USD",
            "exchange_rate": -1
        }
    }));
    let reasons = gate().check(&e, None).reasons;
    assert_eq!(reasons.len(), 4, "{reasons:?}");
    assert_eq!(reasons[0], "missing_fields: payload.remittance_id");
    assert_eq!(reasons[1], "payload.send_amount: 0 <= 0");
    assert_eq!(reasons[2], "payload.exchange_rate: -1 <= 0");
    assert!(reasons[3].starts_with("timestamp_parse_error: "));
}

#[test]
fn unknown_type_needs_only_envelope() {
    let e = event(json!({"event_id": "x", "event_type": "fraud-alert", "timestamp": "2026-03-01T10:00:00Z"}));
    assert!(gate().check(&e, None).accepted());

    let bare = event(json!({"payload": {}}));
    let reasons = gate().check(&bare, None).reasons;
    assert_eq!(reasons[0], "missing_fields: event_id, event_type, timestamp");
    assert_eq!(reasons[1], "missing_timestamp");
}

#[test_case(Duration::hours(2), false ; "two hours ahead is rejected")]
#[test_case(Duration::minutes(30), true ; "thirty minutes ahead is accepted")]
#[test_case(Duration::hours(1), true ; "exactly the tolerance is accepted")]
#[test_case(Duration::hours(-48), true ; "past is accepted")]
fn future_skew_boundary(offset: Duration, accepted: bool) {
    let ts = (now() + offset).to_rfc3339_opts(SecondsFormat::Secs, true);
    let e = event(json!({"event_id": "s", "event_type": "login", "timestamp": ts}));
    let verdict = gate().check(&e, None);
    assert_eq!(verdict.accepted(), accepted, "{:?}", verdict.reasons);
    if !accepted {
        assert_eq!(verdict.reasons, vec!["future_timestamp: 2026-03-01T14:00:00+00:00".to_string()]);
    }
}

#[test]
fn non_string_timestamp_is_unparseable() {
    let e = event(json!({"event_id": "s", "event_type": "login", "timestamp": 1_772_366_400}));
    assert_eq!(gate().check(&e, None).reasons, vec!["unparseable_timestamp: 1772366400".to_string()]);
}

#[test]
fn references_only_warn() {
    let config = GateConfig {
        known_users: Some(HashSet::from(["u-1".to_string()])),
        known_circles: Some(HashSet::new()),
        ..GateConfig::default()
    };
    let gate = QualityGate::new(config, Arc::new(ManualClock::new(now())));
    let e = event(json!({
        "event_id": "c-1",
        "event_type": "circle-created",
        "timestamp": "2026-03-01T11:00:00Z",
        "payload": {"circle_id": "circ-9", "organizer_id": "u-2", "user_id": "u-1"}
    }));

    let verdict = gate.check(&e, None);
    assert!(verdict.accepted());
    assert_eq!(
        verdict.warnings,
        vec!["unknown_organizer_id: u-2".to_string(), "unknown_circle_id: circ-9".to_string()]
    );
}

#[test]
fn schema_violation_is_a_reason() {
    let schema = EventSchema::compile(&json!({
        "properties": {"payload": {"properties": {"amount": {"type": "number"}}}}
    }))
    .unwrap();
    let verdict = gate().check(&transaction(json!("100")), Some(&schema));
    assert_eq!(verdict.reasons.len(), 1);
    assert!(verdict.reasons[0].starts_with("schema_validation_failed: \"100\" is not of type"));
}

#[test]
fn schema_value_constraints_reject() {
    let schema = EventSchema::compile(&json!({
        "properties": {"payload": {"properties": {
            "amount": {"type": "number", "maximum": 10_000},
            "currency": {"enum": ["USD", "HTG"]}
        }}}
    }))
    .unwrap();
    let mut e = transaction(json!(50_000));
    assert!(gate().check(&e, Some(&schema)).reasons[0].starts_with("schema_validation_failed: "));

    e.as_map_mut()["payload"]["amount"] = json!(100);
    assert!(gate().check(&e, Some(&schema)).accepted());
    e.as_map_mut()["payload"]["currency"] = json!("EUR");
    assert_eq!(gate().check(&e, Some(&schema)).reasons.len(), 1);
}

#[test]
fn unbounded_skew_accepts_far_future_timestamps() {
    let config = GateConfig {
        max_future_skew: Duration::MAX,
        ..GateConfig::default()
    };
    let gate = QualityGate::new(config, Arc::new(ManualClock::new(now())));
    let mut e = transaction(json!(100));
    e.as_map_mut().insert("timestamp".into(), json!("9999-12-31T23:59:59Z"));
    assert!(gate.check(&e, None).accepted());
}

#[test]
fn batch_run_splits_and_counts() {
    let config = GateConfig {
        known_users: Some(HashSet::new()),
        ..GateConfig::default()
    };
    let gate = QualityGate::new(config, Arc::new(ManualClock::new(now())));
    let outcome = gate.run(
        vec![transaction(json!(100)), transaction(json!(0)), transaction(json!(5))],
        None,
    );

    assert_eq!(outcome.passed.len(), 2);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].reasons, vec!["payload.amount: 0 <= 0".to_string()]);
    assert_eq!(outcome.report.total, 3);
    assert_eq!(outcome.report.passed, 2);
    assert_eq!(outcome.report.rejected, 1);
    assert_eq!(outcome.report.warnings, 3);
    assert_eq!(outcome.report.warning_details.len(), 3);
}

proptest! {
    #[test]
    fn verdicts_are_deterministic(amount in -1000.0f64..1000.0, minutes in -600i64..600) {
        let ts = (now() + Duration::minutes(minutes)).to_rfc3339();
        let mut e = transaction(json!(amount));
        e.as_map_mut().insert("timestamp".into(), json!(ts));
        let gate = gate();
        prop_assert_eq!(gate.check(&e, None), gate.check(&e, None));
    }
}
