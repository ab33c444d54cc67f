//! Event records.
//!
//! An [`Event`] is an open JSON object as produced upstream. The pipeline never
//! models the payload structurally; components read the handful of fields they
//! need through typed accessors and leave everything else untouched.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DEFAULT_EVENT_VERSION, EventType};

/// A self-describing business event.
///
/// Well-known envelope fields are `event_id`, `event_type`, `event_version`,
/// `timestamp`, `source_service`, `correlation_id` and `payload`. None of them
/// are guaranteed present; the quality gate decides what is acceptable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wraps a JSON value, returning `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Parses an event from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Looks up a dotted path such as `payload.geo_location.latitude`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.str_field("event_id")
    }

    /// The event type, or [`EventType::UNKNOWN`] when absent.
    pub fn event_type(&self) -> EventType {
        self.str_field("event_type")
            .filter(|t| !t.is_empty())
            .map_or_else(EventType::unknown, EventType::from)
    }

    pub fn event_version(&self) -> &str {
        self.str_field("event_version")
            .unwrap_or(DEFAULT_EVENT_VERSION)
    }

    pub fn timestamp(&self) -> Option<&Value> {
        self.0.get("timestamp").filter(|v| !v.is_null())
    }

    /// The timestamp rendered as text; non-string timestamps use their JSON text.
    pub fn timestamp_text(&self) -> String {
        self.field_text("timestamp")
    }

    /// A top-level field as text: strings as-is, other values as JSON, empty
    /// when absent.
    pub fn field_text(&self, field: &str) -> String {
        match self.0.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Parses the timestamp as RFC 3339 (a trailing `Z` is accepted).
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp()
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
    }

    pub fn source_service(&self) -> &str {
        self.str_field("source_service").unwrap_or_default()
    }

    pub fn correlation_id(&self) -> &str {
        self.str_field("correlation_id").unwrap_or_default()
    }

    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.0.get("payload").and_then(Value::as_object)
    }

    /// Payload field coerced to a number; numeric strings are accepted.
    pub fn payload_f64(&self, field: &str) -> Option<f64> {
        coerce_f64(self.payload()?.get(field)?)
    }

    /// Key used to recognise the same event delivered twice: the event id and
    /// timestamp as text, whatever their JSON type.
    pub fn dedup_key(&self) -> (String, String) {
        (self.field_text("event_id"), self.timestamp_text())
    }

    /// Serializes the event back to JSON text.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

impl From<Map<String, Value>> for Event {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Parses an event timestamp, accepting RFC 3339 with either an offset or `Z`,
/// and naive `YYYY-MM-DDTHH:MM:SS[.fff]` or `YYYY-MM-DD`, which are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Converts a JSON number or numeric string to `f64`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Bus-level metadata attached at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestMeta {
    pub ingested_at: DateTime<Utc>,
    pub source_topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// An event as held in the bronze buffer: the untouched event plus ingestion metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct BronzeRecord {
    pub event: Event,
    pub meta: IngestMeta,
}

impl BronzeRecord {
    pub fn new(event: Event, meta: IngestMeta) -> Self {
        Self { event, meta }
    }

    /// The event with the `_ingested_at`, `_source_topic`, `_partition` and
    /// `_offset` fields added. The payload is not modified.
    pub fn enriched(&self) -> Event {
        let mut map = self.event.as_map().clone();
        map.insert(
            "_ingested_at".into(),
            Value::String(
                self.meta
                    .ingested_at
                    .to_rfc3339_opts(SecondsFormat::Micros, false),
            ),
        );
        map.insert("_source_topic".into(), Value::String(self.meta.source_topic.clone()));
        map.insert("_partition".into(), Value::from(self.meta.partition));
        map.insert("_offset".into(), Value::from(self.meta.offset));
        Event(map)
    }
}

/// An event the quality gate refused, with every reason it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub event: Event,
    pub reasons: Vec<String>,
}
