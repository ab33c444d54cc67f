//! Which fields are personal data, per event type.

use std::collections::BTreeSet;

/// Fields treated as personal data in every event.
pub const ALL_PII_FIELDS: [&str; 15] = [
    "user_id",
    "sender_id",
    "organizer_id",
    "recipient_id",
    "email",
    "phone",
    "ip_address",
    "device_id",
    "full_name",
    "recipient_name",
    "recipient_phone",
    "address",
    "government_id",
    "geo_location.latitude",
    "geo_location.longitude",
];

/// Extra payload fields declared for a known event type.
pub fn event_pii_fields(event_type: &str) -> &'static [&'static str] {
    match event_type {
        "transaction-initiated" => &[
            "user_id",
            "ip_address",
            "device_id",
            "recipient_id",
            "geo_location.latitude",
            "geo_location.longitude",
        ],
        "transaction-completed" => &["user_id", "ip_address", "device_id", "recipient_id"],
        "transaction-failed" | "transaction-flagged" | "session-ended" => &["user_id", "ip_address", "device_id"],
        "session-started" => &[
            "user_id",
            "ip_address",
            "device_id",
            "geo_location.latitude",
            "geo_location.longitude",
        ],
        "circle-created" => &["organizer_id"],
        "circle-member-joined" => &["user_id", "organizer_id"],
        "circle-member-dropped" => &["user_id"],
        "remittance-initiated" | "remittance-completed" => &["sender_id", "recipient_name", "recipient_phone"],
        "remittance-failed" => &["sender_id"],
        _ => &[],
    }
}

/// Every dotted path tokenized for `event_type`, sorted.
pub fn pii_fields(event_type: &str) -> BTreeSet<&'static str> {
    ALL_PII_FIELDS
        .iter()
        .chain(event_pii_fields(event_type))
        .copied()
        .collect()
}

/// Returns true if the type declares PII fields of its own.
pub fn has_declared_pii(event_type: &str) -> bool {
    !event_pii_fields(event_type).is_empty()
}
