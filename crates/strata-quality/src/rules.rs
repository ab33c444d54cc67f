//! Per-type completeness and range rules.

/// Fields every event must carry, and the fallback for unknown types.
pub const BASE_REQUIRED: [&str; 3] = ["event_id", "event_type", "timestamp"];

/// Dotted paths that must be present and non-blank, beyond [`BASE_REQUIRED`].
pub fn required_fields(event_type: &str) -> &'static [&'static str] {
    match event_type {
        "transaction-initiated" => &[
            "payload.transaction_id",
            "payload.user_id",
            "payload.amount",
            "payload.currency",
        ],
        "transaction-completed" | "transaction-failed" | "transaction-flagged" => {
            &["payload.transaction_id", "payload.user_id"]
        }
        "session-started" | "session-ended" => &["payload.session_id", "payload.user_id"],
        "circle-created" => &["payload.circle_id", "payload.organizer_id"],
        "circle-member-joined" | "circle-member-dropped" => &["payload.circle_id"],
        "remittance-initiated" => &[
            "payload.remittance_id",
            "payload.sender_id",
            "payload.send_amount",
            "payload.send_currency",
        ],
        "remittance-completed" | "remittance-failed" => &["payload.remittance_id"],
        _ => &[],
    }
}

/// Bounds on a numeric field. `min` is exclusive, `max` inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub field: &'static str,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Range {
    const fn positive(field: &'static str) -> Self {
        Self {
            field,
            min: Some(0.0),
            max: None,
        }
    }
}

pub fn range_checks(event_type: &str) -> &'static [Range] {
    const TRANSACTION: [Range; 1] = [Range::positive("payload.amount")];
    const REMITTANCE: [Range; 2] = [
        Range::positive("payload.send_amount"),
        Range::positive("payload.exchange_rate"),
    ];

    match event_type {
        "transaction-initiated" => &TRANSACTION,
        "remittance-initiated" => &REMITTANCE,
        _ => &[],
    }
}

/// Payload fields checked against the known-user set.
pub const USER_REFERENCE_FIELDS: [&str; 4] = ["user_id", "sender_id", "organizer_id", "recipient_id"];
