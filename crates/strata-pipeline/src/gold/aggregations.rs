//! Aggregation functions behind the gold datasets.
//!
//! Every function is pure: output depends only on the events and the `as_of`
//! instant of the refresh. Buckets are kept in ordered maps so row order is
//! stable across runs.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use strata_storage::Row;
use strata_types::{Event, coerce_f64};

/// Transactions at or above this amount count towards currency transaction reports.
pub const CTR_THRESHOLD: f64 = 10_000.0;

const UNKNOWN: &str = "unknown";

fn payload(event: &Event) -> Map<String, Value> {
    if let Some(p) = event.payload() {
        return p.clone();
    }
    event
        .get("payload_json")
        .and_then(Value::as_str)
        .and_then(|text| serde_json::from_str(text).ok())
        .unwrap_or_default()
}

fn field_f64(payload: &Map<String, Value>, field: &str) -> f64 {
    payload.get(field).and_then(coerce_f64).unwrap_or(0.0)
}

/// A non-empty identifier rendered as text.
fn field_id(payload: &Map<String, Value>, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Calendar day in UTC, whatever offset the event was stamped with.
fn day(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

// ============================================================================
// Daily transaction summary
// ============================================================================

#[derive(Default)]
struct TransactionBucket {
    count: u64,
    total: f64,
    amounts: Vec<f64>,
    recipients: BTreeSet<String>,
    corridors: BTreeSet<String>,
}

/// Per-user, per-day transaction metrics.
pub fn daily_transactions(events: &[Event], _as_of: DateTime<Utc>) -> Vec<Row> {
    let mut buckets: BTreeMap<(String, String), TransactionBucket> = BTreeMap::new();

    for event in events {
        let Some(ts) = event.parsed_timestamp() else {
            continue;
        };
        let p = payload(event);
        let user = field_id(&p, "user_id").unwrap_or_else(|| UNKNOWN.to_string());
        let b = buckets.entry((user, day(ts))).or_default();

        let amount = field_f64(&p, "amount");
        b.count += 1;
        b.total += amount;
        b.amounts.push(amount);
        if let Some(r) = field_id(&p, "recipient_id") {
            b.recipients.insert(r);
        }
        if let Some(c) = field_id(&p, "corridor") {
            b.corridors.insert(c);
        }
    }

    buckets
        .into_iter()
        .map(|((user, date), b)| {
            let min = b.amounts.iter().copied().fold(f64::INFINITY, f64::min);
            let max = b.amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            row(json!({
                "user_id": user,
                "date": date,
                "transaction_count": b.count,
                "total_amount": round_to(b.total, 2),
                "average_amount": round_to(b.total / b.amounts.len() as f64, 2),
                "min_amount": round_to(min, 2),
                "max_amount": round_to(max, 2),
                "distinct_recipients": b.recipients.len(),
                "distinct_corridors": b.corridors.len(),
            }))
        })
        .collect()
}

// ============================================================================
// Circle lifecycle summary
// ============================================================================

struct CircleBucket {
    member_count_original: i64,
    member_count_current: i64,
    member_count_dropped: i64,
    expected_collected: f64,
    days_active: i64,
    created_at: Option<String>,
}

/// Per-circle membership and collection metrics. Events apply in input order.
pub fn circle_lifecycle(events: &[Event], as_of: DateTime<Utc>) -> Vec<Row> {
    let mut circles: BTreeMap<String, CircleBucket> = BTreeMap::new();

    for event in events {
        let p = payload(event);
        let circle_id = field_id(&p, "circle_id").unwrap_or_else(|| UNKNOWN.to_string());
        let c = circles.entry(circle_id).or_insert(CircleBucket {
            member_count_original: 0,
            member_count_current: 0,
            member_count_dropped: 0,
            expected_collected: 0.0,
            days_active: 0,
            created_at: None,
        });

        match event.event_type().as_str() {
            "circle-created" => {
                let max_members = p.get("max_members").and_then(coerce_f64);
                c.member_count_original = max_members.map_or(0, |m| m as i64);
                c.member_count_current = 1;
                if let Some(ts) = event.parsed_timestamp() {
                    c.created_at = Some(ts.to_rfc3339());
                    c.days_active = (as_of - ts).num_days();
                }
                c.expected_collected = field_f64(&p, "contribution_amount") * max_members.unwrap_or(10.0).trunc();
            }
            "circle-member-joined" => c.member_count_current += 1,
            "circle-member-dropped" => {
                c.member_count_current = (c.member_count_current - 1).max(0);
                c.member_count_dropped += 1;
            }
            _ => {}
        }
    }

    circles
        .into_iter()
        .map(|(circle_id, c)| {
            // No contribution events reach this dataset yet.
            let total_collected = 0.0;
            let collection_ratio = if c.expected_collected > 0.0 {
                round_to(total_collected / c.expected_collected, 4)
            } else {
                0.0
            };
            row(json!({
                "circle_id": circle_id,
                "health_score": 0.0,
                "current_tier": UNKNOWN,
                "member_count_original": c.member_count_original,
                "member_count_current": c.member_count_current,
                "member_count_dropped": c.member_count_dropped,
                "total_collected": total_collected,
                "expected_collected": c.expected_collected,
                "collection_ratio": collection_ratio,
                "payout_completion_rate": 0.0,
                "days_active": c.days_active,
                "estimated_completion_date": Value::Null,
                "created_at": c.created_at,
            }))
        })
        .collect()
}

// ============================================================================
// User risk dashboard
// ============================================================================

#[derive(Default)]
struct UserBucket {
    volume_7d: f64,
    volume_30d: f64,
    volume_90d: f64,
    circle_participation: u64,
}

/// Per-user transaction volume windows relative to `as_of`.
pub fn user_risk(events: &[Event], as_of: DateTime<Utc>) -> Vec<Row> {
    let mut users: BTreeMap<String, UserBucket> = BTreeMap::new();

    for event in events {
        let p = payload(event);
        let user = field_id(&p, "user_id")
            .or_else(|| field_id(&p, "sender_id"))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let u = users.entry(user).or_default();
        let event_type = event.event_type();

        if event_type.is_domain("transaction") {
            if let Some(ts) = event.parsed_timestamp() {
                let amount = field_f64(&p, "amount");
                let days_ago = (as_of - ts).num_days();
                if days_ago <= 7 {
                    u.volume_7d += amount;
                }
                if days_ago <= 30 {
                    u.volume_30d += amount;
                }
                if days_ago <= 90 {
                    u.volume_90d += amount;
                }
            }
        } else if event_type.as_str() == "circle-member-joined" {
            u.circle_participation += 1;
        }
    }

    users
        .into_iter()
        .map(|(user, u)| {
            row(json!({
                "user_id": user,
                "fraud_score": 0.0,
                "compliance_risk_level": "low",
                "engagement_stage": UNKNOWN,
                "ato_alert_count": 0,
                "compliance_alert_count": 0,
                "ctr_filing_count": 0,
                "txn_volume_7d": round_to(u.volume_7d, 2),
                "txn_volume_30d": round_to(u.volume_30d, 2),
                "txn_volume_90d": round_to(u.volume_90d, 2),
                "circle_participation_count": u.circle_participation,
            }))
        })
        .collect()
}

// ============================================================================
// Compliance reporting
// ============================================================================

/// Per-day counts of transactions that reach the CTR threshold.
pub fn compliance_reporting(events: &[Event], _as_of: DateTime<Utc>) -> Vec<Row> {
    let mut days: BTreeMap<String, (u64, f64)> = BTreeMap::new();

    for event in events {
        let Some(ts) = event.parsed_timestamp() else {
            continue;
        };
        let d = days.entry(day(ts)).or_default();
        let event_type = event.event_type();
        if matches!(event_type.as_str(), "transaction-initiated" | "transaction-completed") {
            let amount = field_f64(&payload(event), "amount");
            if amount >= CTR_THRESHOLD {
                d.0 += 1;
                d.1 += amount;
            }
        }
    }

    days.into_iter()
        .map(|(date, (count, total))| {
            row(json!({
                "date": date,
                "ctr_filing_count": count,
                "ctr_total_amount": round_to(total, 2),
                "sar_filing_count": 0,
                "compliance_alerts_by_type": {},
                "compliance_alerts_by_priority": {},
                "structuring_detections": {},
                "customers_by_risk_level": {"low": 0, "medium": 0, "high": 0, "critical": 0},
                "edd_reviews_due": 0,
            }))
        })
        .collect()
}

// ============================================================================
// Platform health
// ============================================================================

#[derive(Default)]
struct HealthBucket {
    active_users: BTreeSet<String>,
    sessions: u64,
    transaction_count: u64,
    transaction_volume: f64,
    remittance_count: u64,
    remittance_volume: f64,
    remittance_corridors: BTreeSet<String>,
    circles_created: u64,
}

/// Platform-wide activity per day.
pub fn platform_health(events: &[Event], _as_of: DateTime<Utc>) -> Vec<Row> {
    let mut days: BTreeMap<String, HealthBucket> = BTreeMap::new();

    for event in events {
        let Some(ts) = event.parsed_timestamp() else {
            continue;
        };
        let p = payload(event);
        let d = days.entry(day(ts)).or_default();

        if let Some(uid) = ["user_id", "sender_id", "organizer_id"]
            .iter()
            .find_map(|f| field_id(&p, f))
        {
            d.active_users.insert(uid);
        }

        let event_type = event.event_type();
        if event_type.as_str() == "session-started" {
            d.sessions += 1;
        } else if event_type.is_domain("transaction") {
            d.transaction_count += 1;
            d.transaction_volume += field_f64(&p, "amount");
        } else if event_type.is_domain("remittance") {
            d.remittance_count += 1;
            d.remittance_volume += field_f64(&p, "send_amount");
            if let Some(country) = field_id(&p, "recipient_country") {
                d.remittance_corridors.insert(country);
            }
        } else if event_type.as_str() == "circle-created" {
            d.circles_created += 1;
        }
    }

    days.into_iter()
        .map(|(date, d)| {
            row(json!({
                "date": date,
                "active_users": d.active_users.len(),
                "sessions": d.sessions,
                "transaction_count": d.transaction_count,
                "transaction_volume": round_to(d.transaction_volume, 2),
                "remittance_count": d.remittance_count,
                "remittance_volume": round_to(d.remittance_volume, 2),
                "remittance_corridors": d.remittance_corridors.len(),
                "circles_active": d.circles_created,
                "circles_created": d.circles_created,
                "avg_fraud_score": 0.0,
                "avg_circle_health": 0.0,
            }))
        })
        .collect()
}

// ============================================================================
// Haiti corridor analytics
// ============================================================================

#[derive(Default)]
struct CorridorBucket {
    remittance_count: u64,
    amounts: Vec<f64>,
    exchange_rates: Vec<f64>,
    delivered: u64,
    failed: u64,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Remittance volume and delivery rates per day and `{sender_state}->{recipient_country}` corridor.
pub fn haiti_corridor(events: &[Event], _as_of: DateTime<Utc>) -> Vec<Row> {
    let mut buckets: BTreeMap<(String, String), CorridorBucket> = BTreeMap::new();

    for event in events {
        let event_type = event.event_type();
        if !event_type.is_domain("remittance") {
            continue;
        }
        let Some(ts) = event.parsed_timestamp() else {
            continue;
        };
        let p = payload(event);
        let sender_state = field_id(&p, "sender_state").unwrap_or_else(|| "US".to_string());
        let recipient_country = field_id(&p, "recipient_country").unwrap_or_else(|| "HT".to_string());
        let b = buckets
            .entry((day(ts), format!("{sender_state}->{recipient_country}")))
            .or_default();

        match event_type.as_str() {
            "remittance-initiated" => {
                b.remittance_count += 1;
                b.amounts.push(field_f64(&p, "send_amount"));
                let rate = field_f64(&p, "exchange_rate");
                if rate > 0.0 {
                    b.exchange_rates.push(rate);
                }
            }
            "remittance-completed" => b.delivered += 1,
            "remittance-failed" => b.failed += 1,
            _ => {}
        }
    }

    buckets
        .into_iter()
        .map(|((date, corridor), b)| {
            let deliveries = b.delivered + b.failed;
            let success_rate = if deliveries > 0 {
                round_to(b.delivered as f64 / deliveries as f64, 4)
            } else {
                0.0
            };
            row(json!({
                "date": date,
                "corridor": corridor,
                "remittance_count": b.remittance_count,
                "total_volume_usd": round_to(b.amounts.iter().sum(), 2),
                "average_amount": mean(&b.amounts).map_or(0.0, |m| round_to(m, 2)),
                "average_exchange_rate": mean(&b.exchange_rates).map_or(0.0, |m| round_to(m, 4)),
                "delivery_success_rate": success_rate,
                "average_delivery_time": Value::Null,
                "active_agent_count": Value::Null,
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap()
    }

    fn event(v: Value) -> Event {
        Event::from_value(v).unwrap()
    }

    fn txn(user: &str, ts: &str, amount: f64) -> Event {
        event(json!({
            "event_id": format!("{user}-{ts}"),
            "event_type": "transaction-initiated",
            "timestamp": ts,
            "payload": {"user_id": user, "amount": amount, "recipient_id": "r-1"}
        }))
    }

    #[test]
    fn daily_transactions_bucket_by_user_and_day() {
        let rows = daily_transactions(
            &[
                txn("u-1", "2026-03-01T10:00:00Z", 100.0),
                txn("u-1", "2026-03-01T18:00:00Z", 50.0),
                txn("u-1", "2026-03-02T09:00:00Z", 10.0),
                txn("u-2", "2026-03-01T09:00:00Z", 5.0),
                event(json!({"event_type": "transaction-initiated", "timestamp": "never"})),
            ],
            as_of(),
        );
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["user_id"], json!("u-1"));
        assert_eq!(rows[0]["date"], json!("2026-03-01"));
        assert_eq!(rows[0]["transaction_count"], json!(2));
        assert_eq!(rows[0]["total_amount"], json!(150.0));
        assert_eq!(rows[0]["average_amount"], json!(75.0));
        assert_eq!(rows[0]["min_amount"], json!(50.0));
        assert_eq!(rows[0]["distinct_recipients"], json!(1));
    }

    #[test]
    fn days_are_utc_days() {
        let rows = daily_transactions(
            &[
                txn("u-1", "2026-03-01T23:30:00-05:00", 10.0),
                txn("u-1", "2026-03-02T01:00:00Z", 5.0),
            ],
            as_of(),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["date"], json!("2026-03-02"));
        assert_eq!(rows[0]["transaction_count"], json!(2));
    }

    #[test]
    fn compliance_counts_only_threshold_amounts() {
        let rows = compliance_reporting(
            &[
                txn("u-1", "2026-03-01T10:00:00Z", 10_000.0),
                txn("u-2", "2026-03-01T11:00:00Z", 9_999.99),
            ],
            as_of(),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["ctr_filing_count"], json!(1));
        assert_eq!(rows[0]["ctr_total_amount"], json!(10_000.0));
    }

    #[test]
    fn user_risk_windows_follow_as_of() {
        let events = [
            txn("u-1", "2026-03-08T00:00:00Z", 10.0),
            txn("u-1", "2026-02-20T00:00:00Z", 20.0),
            txn("u-1", "2025-12-20T00:00:00Z", 40.0),
        ];
        let rows = user_risk(&events, as_of());
        assert_eq!(rows[0]["txn_volume_7d"], json!(10.0));
        assert_eq!(rows[0]["txn_volume_30d"], json!(30.0));
        assert_eq!(rows[0]["txn_volume_90d"], json!(70.0));
    }

    #[test]
    fn circle_membership_tracks_joins_and_drops() {
        let created = event(json!({
            "event_type": "circle-created",
            "timestamp": "2026-03-01T00:00:00Z",
            "payload": {"circle_id": "c-1", "max_members": 5, "contribution_amount": "20"}
        }));
        let joined = event(json!({"event_type": "circle-member-joined", "payload": {"circle_id": "c-1"}}));
        let dropped = event(json!({"event_type": "circle-member-dropped", "payload": {"circle_id": "c-1"}}));

        let rows = circle_lifecycle(&[created, joined.clone(), joined, dropped], as_of());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["member_count_original"], json!(5));
        assert_eq!(rows[0]["member_count_current"], json!(2));
        assert_eq!(rows[0]["member_count_dropped"], json!(1));
        assert_eq!(rows[0]["expected_collected"], json!(100.0));
        assert_eq!(rows[0]["days_active"], json!(9));
    }

    #[test]
    fn corridor_defaults_and_delivery_rate() {
        let remit = |t: &str, payload: Value| {
            event(json!({"event_type": t, "timestamp": "2026-03-01T08:00:00Z", "payload": payload}))
        };
        let rows = haiti_corridor(
            &[
                remit("remittance-initiated", json!({"send_amount": 200, "exchange_rate": 131.5})),
                remit("remittance-initiated", json!({"send_amount": 100, "sender_state": "FL"})),
                remit("remittance-completed", json!({})),
                remit("remittance-failed", json!({})),
                remit("remittance-completed", json!({})),
            ],
            as_of(),
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["corridor"], json!("FL->HT"));
        assert_eq!(rows[1]["corridor"], json!("US->HT"));
        assert_eq!(rows[1]["remittance_count"], json!(1));
        assert_eq!(rows[1]["average_exchange_rate"], json!(131.5));
        assert_eq!(rows[1]["delivery_success_rate"], json!(0.6667));
    }

    #[test]
    fn platform_health_counts_activity() {
        let session = event(json!({
            "event_type": "session-started",
            "timestamp": "2026-03-01T08:00:00Z",
            "payload": {"user_id": "u-1"}
        }));
        let rows = platform_health(&[session, txn("u-1", "2026-03-01T09:00:00Z", 12.5)], as_of());
        assert_eq!(rows[0]["active_users"], json!(1));
        assert_eq!(rows[0]["sessions"], json!(1));
        assert_eq!(rows[0]["transaction_volume"], json!(12.5));
    }
}
