//! Column layouts of bronze, silver and dead-letter partitions.
//!
//! Envelope fields are flattened into text columns, the payload is kept as
//! JSON text in `payload_json`, and bronze additionally keeps the complete
//! enriched event in `_raw_json` so it can be replayed byte-for-byte.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use strata_types::{BronzeRecord, DEFAULT_EVENT_VERSION, Event, Rejection};

use crate::codec::{Column, ColumnType, Row, Table};

const ENVELOPE: [&str; 5] = ["event_id", "event_type", "timestamp", "source_service", "correlation_id"];

fn envelope_columns() -> Vec<Column> {
    let mut columns: Vec<Column> = ENVELOPE
        .iter()
        .map(|name| Column::new(*name, ColumnType::Utf8, true))
        .collect();
    columns.insert(2, Column::new("event_version", ColumnType::Utf8, true));
    columns.push(Column::new("payload_json", ColumnType::Utf8, true));
    columns
}

/// `event_id, event_type, event_version, timestamp, source_service,
/// correlation_id, payload_json, _ingested_at, _source_topic, _partition,
/// _offset, _raw_json`
pub fn bronze_columns() -> Vec<Column> {
    let mut columns = envelope_columns();
    columns.extend([
        Column::new("_ingested_at", ColumnType::Utf8, true),
        Column::new("_source_topic", ColumnType::Utf8, true),
        Column::new("_partition", ColumnType::Int64, true),
        Column::new("_offset", ColumnType::Int64, true),
        Column::new("_raw_json", ColumnType::Utf8, true),
    ]);
    columns
}

/// The bronze layout without bus coordinates and raw text, plus `_processed_at`.
pub fn silver_columns() -> Vec<Column> {
    let mut columns = envelope_columns();
    columns.extend([
        Column::new("_ingested_at", ColumnType::Utf8, true),
        Column::new("_source_topic", ColumnType::Utf8, true),
        Column::new("_processed_at", ColumnType::Utf8, true),
    ]);
    columns
}

/// `event_id, event_type, rejection_reasons, raw_event, _rejected_at`
pub fn rejected_columns() -> Vec<Column> {
    ["event_id", "event_type", "rejection_reasons", "raw_event", "_rejected_at"]
        .into_iter()
        .map(|name| Column::new(name, ColumnType::Utf8, true))
        .collect()
}

/// Field as text: strings verbatim, other values as JSON text, absent as `default`.
fn text(event: &Event, field: &str, default: &str) -> Value {
    match event.get(field) {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Null) | None => Value::String(default.to_string()),
        Some(other) => Value::String(other.to_string()),
    }
}

fn envelope_row(event: &Event) -> Row {
    let mut row = Row::new();
    for field in ENVELOPE {
        row.insert(field.to_string(), text(event, field, ""));
    }
    row.insert("event_version".into(), text(event, "event_version", DEFAULT_EVENT_VERSION));
    let payload = event
        .get("payload")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    row.insert("payload_json".into(), Value::String(payload.to_string()));
    row
}

pub fn timestamp_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Flattens buffered records into a bronze table.
pub fn bronze_table(records: &[BronzeRecord]) -> Table {
    let rows = records
        .iter()
        .map(|record| {
            let enriched = record.enriched();
            let mut row = envelope_row(&enriched);
            row.insert("_ingested_at".into(), text(&enriched, "_ingested_at", ""));
            row.insert("_source_topic".into(), Value::String(record.meta.source_topic.clone()));
            row.insert("_partition".into(), Value::from(record.meta.partition));
            row.insert("_offset".into(), Value::from(record.meta.offset));
            row.insert("_raw_json".into(), Value::String(enriched.to_json()));
            row
        })
        .collect();
    Table::new(bronze_columns(), rows)
}

/// Flattens processed events into a silver table.
pub fn silver_table(events: &[Event], processed_at: DateTime<Utc>) -> Table {
    let processed_at = Value::String(timestamp_text(processed_at));
    let rows = events
        .iter()
        .map(|event| {
            let mut row = envelope_row(event);
            row.insert("_ingested_at".into(), text(event, "_ingested_at", ""));
            row.insert("_source_topic".into(), text(event, "_source_topic", ""));
            row.insert("_processed_at".into(), processed_at.clone());
            row
        })
        .collect();
    Table::new(silver_columns(), rows)
}

/// Builds a dead-letter table for one event type.
pub fn rejected_table(rejections: &[Rejection], event_type: &str, rejected_at: DateTime<Utc>) -> Table {
    let rejected_at = Value::String(timestamp_text(rejected_at));
    let rows = rejections
        .iter()
        .map(|r| {
            let mut row = Row::new();
            row.insert("event_id".into(), text(&r.event, "event_id", ""));
            row.insert("event_type".into(), Value::String(event_type.to_string()));
            row.insert(
                "rejection_reasons".into(),
                Value::String(Value::from(r.reasons.clone()).to_string()),
            );
            row.insert("raw_event".into(), Value::String(r.event.to_json()));
            row.insert("_rejected_at".into(), rejected_at.clone());
            row
        })
        .collect();
    Table::new(rejected_columns(), rows)
}

/// Reconstructs events from a bronze or silver table.
///
/// Tables carrying `_raw_json` are replayed from it; rows whose raw text does
/// not parse as a JSON object are skipped. Otherwise each row becomes an event
/// with `payload_json` parsed back into `payload`.
pub fn events_from_table(table: &Table) -> (Vec<Event>, usize) {
    if table.has_column("_raw_json") {
        let mut skipped = 0;
        let events = table
            .rows()
            .iter()
            .filter_map(|row| {
                let event = row
                    .get("_raw_json")
                    .and_then(Value::as_str)
                    .and_then(|raw| Event::from_json(raw).ok());
                if event.is_none() {
                    skipped += 1;
                }
                event
            })
            .collect();
        return (events, skipped);
    }

    let events = table.rows().iter().cloned().map(event_from_row).collect();
    (events, 0)
}

/// Turns a flattened row back into an event, restoring `payload`.
pub fn event_from_row(mut row: Row) -> Event {
    let parsed = row
        .get("payload_json")
        .and_then(Value::as_str)
        .and_then(|text| serde_json::from_str::<Value>(text).ok());
    if let Some(payload) = parsed {
        row.remove("payload_json");
        row.insert("payload".into(), payload);
    }
    Event::new(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use strata_types::IngestMeta;

    use crate::codec::{Compression, decode, encode};

    fn event(v: Value) -> Event {
        Event::from_value(v).unwrap()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn record(offset: i64) -> BronzeRecord {
        BronzeRecord::new(
            event(json!({
                "event_id": format!("e-{offset}"),
                "event_type": "transaction-initiated",
                "timestamp": "2026-03-01T11:59:00Z",
                "payload": {"amount": 12.5, "user_id": "u-1"}
            })),
            IngestMeta {
                ingested_at: at(),
                source_topic: "trebanx.transaction.events".into(),
                partition: 0,
                offset,
            },
        )
    }

    #[test]
    fn bronze_rows_replay_from_raw_json() {
        let table = bronze_table(&[record(7), record(8)]);
        let decoded = decode(&encode(&table, Compression::Snappy).unwrap()).unwrap();
        let names: Vec<&str> = decoded.column_names().collect();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], "event_id");
        assert_eq!(names[11], "_raw_json");

        let (events, skipped) = events_from_table(&decoded);
        assert_eq!(skipped, 0);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_id(), Some("e-7"));
        assert_eq!(events[0].get("_offset"), Some(&json!(7)));
        assert_eq!(events[1].payload_f64("amount"), Some(12.5));
    }

    #[test]
    fn missing_envelope_fields_get_defaults() {
        let table = silver_table(&[event(json!({"event_id": "e-1"}))], at());
        let row = &table.rows()[0];
        assert_eq!(row["event_version"], json!("1.0"));
        assert_eq!(row["source_service"], json!(""));
        assert_eq!(row["payload_json"], json!("{}"));
        assert_eq!(row["_processed_at"], json!("2026-03-01T12:00:00.000000+00:00"));
    }

    #[test]
    fn silver_rows_restore_payload() {
        let original = event(json!({
            "event_id": "e-1",
            "event_type": "circle-created",
            "timestamp": "2026-03-01T10:00:00Z",
            "payload": {"circle_id": "c-1", "contribution_amount": 50}
        }));
        let table = silver_table(std::slice::from_ref(&original), at());
        let (events, _) = events_from_table(&table);
        assert_eq!(events[0].payload(), original.payload());
        assert!(events[0].get("payload_json").is_none());
    }

    #[test]
    fn unparseable_raw_rows_are_skipped() {
        let mut table = bronze_table(&[record(1)]);
        let mut rows = table.clone().into_rows();
        let mut broken = rows[0].clone();
        broken.insert("_raw_json".into(), json!("{not json"));
        rows.push(broken);
        table = Table::new(bronze_columns(), rows);

        let (events, skipped) = events_from_table(&table);
        assert_eq!(events.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn rejected_rows_carry_reasons_as_json() {
        let rejection = Rejection {
            event: event(json!({"event_id": "e-9"})),
            reasons: vec!["payload.amount: 0 <= 0".into()],
        };
        let table = rejected_table(&[rejection], "transaction-initiated", at());
        let row = &table.rows()[0];
        assert_eq!(row["rejection_reasons"], json!("[\"payload.amount: 0 <= 0\"]"));
        assert_eq!(row["raw_event"], json!("{\"event_id\":\"e-9\"}"));
    }
}
