//! Gold aggregations are pure functions of their input and `as_of`.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;
use strata_pipeline::gold::DATASETS;
use strata_types::Event;

const TYPES: [&str; 8] = [
    "transaction-initiated",
    "transaction-completed",
    "session-started",
    "circle-created",
    "circle-member-joined",
    "remittance-initiated",
    "remittance-completed",
    "remittance-failed",
];

fn arb_event() -> impl Strategy<Value = Event> {
    (
        0..TYPES.len(),
        0i64..60 * 24 * 20,
        0u8..4,
        0.0f64..25_000.0,
        proptest::option::of("[A-Z]{2}"),
    )
        .prop_map(|(t, minutes, user, amount, country)| {
            let ts = Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).unwrap() + Duration::minutes(minutes);
            Event::from_value(json!({
                "event_id": format!("e-{minutes}-{user}"),
                "event_type": TYPES[t],
                "timestamp": ts.to_rfc3339(),
                "payload": {
                    "user_id": format!("tok_user_id_{user}"),
                    "sender_id": format!("tok_sender_id_{user}"),
                    "circle_id": format!("c-{}", user % 2),
                    "amount": amount,
                    "send_amount": amount,
                    "exchange_rate": 131.0,
                    "max_members": 8,
                    "contribution_amount": 25,
                    "recipient_country": country,
                }
            }))
            .unwrap()
        })
}

proptest! {
    #[test]
    fn aggregations_are_repeatable(events in proptest::collection::vec(arb_event(), 0..40)) {
        let as_of = Utc.with_ymd_and_hms(2026, 3, 12, 0, 0, 0).unwrap();
        for def in &DATASETS {
            let first = (def.aggregate)(&events, as_of);
            let second = (def.aggregate)(&events, as_of);
            prop_assert_eq!(first, second, "{} is not repeatable", def.name);
        }
    }
}
