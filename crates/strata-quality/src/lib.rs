//! # strata-quality: Data quality gate
//!
//! Decides, event by event, whether an event may enter the silver layer.
//!
//! Checks run in a fixed order and never short-circuit, so a rejected event
//! carries every reason it failed:
//!
//! 1. schema validation (only when a schema is supplied)
//! 2. completeness: required dotted paths present and non-blank
//! 3. numeric ranges, one reason per violation
//! 4. timestamp: present, parseable, not beyond the allowed future skew
//!
//! Referential checks against known users and circles only produce warnings.
//! Referenced entities may legitimately arrive later than the events that
//! mention them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use strata_types::{Clock, Event, Rejection, coerce_f64};

pub mod rules;
pub mod schema;

pub use schema::{EventSchema, InvalidSchema};

/// Future skew tolerated by default, in seconds.
pub const DEFAULT_MAX_FUTURE_SKEW_SECONDS: i64 = 3600;

/// Gate settings.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub max_future_skew: Duration,
    /// Known user ids; `None` disables user reference warnings.
    pub known_users: Option<HashSet<String>>,
    /// Known circle ids; `None` disables circle reference warnings.
    pub known_circles: Option<HashSet<String>>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_future_skew: Duration::seconds(DEFAULT_MAX_FUTURE_SKEW_SECONDS),
            known_users: None,
            known_circles: None,
        }
    }
}

/// Outcome of checking one event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
}

impl Verdict {
    pub fn accepted(&self) -> bool {
        self.reasons.is_empty()
    }
}

/// Warnings raised for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningDetail {
    pub event_id: Option<String>,
    pub warnings: Vec<String>,
}

/// Counts for one gated batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QualityReport {
    pub total: usize,
    pub passed: usize,
    pub rejected: usize,
    pub warnings: usize,
    pub warning_details: Vec<WarningDetail>,
}

/// A batch split by the gate.
#[derive(Debug, Clone, Default)]
pub struct GateOutcome {
    pub passed: Vec<Event>,
    pub rejected: Vec<Rejection>,
    pub report: QualityReport,
}

/// The data quality gate.
///
/// Stateless apart from its configuration: the same event checked against the
/// same clock reading always yields the same verdict.
#[derive(Clone)]
pub struct QualityGate {
    config: GateConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for QualityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityGate").field("config", &self.config).finish_non_exhaustive()
    }
}

impl QualityGate {
    pub fn new(config: GateConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Checks one event, optionally against a compiled schema.
    pub fn check(&self, event: &Event, schema: Option<&EventSchema>) -> Verdict {
        let now = self.clock.now();
        let mut reasons = Vec::new();

        if let Some(schema) = schema
            && let Err(detail) = schema.validate(&Value::Object(event.as_map().clone()))
        {
            reasons.push(format!("schema_validation_failed: {detail}"));
        }

        let missing = missing_fields(event);
        if !missing.is_empty() {
            reasons.push(format!("missing_fields: {}", missing.join(", ")));
        }

        reasons.extend(range_violations(event));

        if let Some(reason) = self.timestamp_problem(event, now) {
            reasons.push(reason);
        }

        Verdict {
            reasons,
            warnings: self.reference_warnings(event),
        }
    }

    /// Gates a batch, preserving input order within passed and rejected.
    pub fn run(&self, events: Vec<Event>, schema: Option<&EventSchema>) -> GateOutcome {
        let mut outcome = GateOutcome::default();

        for event in events {
            let verdict = self.check(&event, schema);
            let report = &mut outcome.report;
            report.total += 1;

            if !verdict.warnings.is_empty() {
                report.warnings += verdict.warnings.len();
                report.warning_details.push(WarningDetail {
                    event_id: event.event_id().map(str::to_string),
                    warnings: verdict.warnings,
                });
            }

            if verdict.reasons.is_empty() {
                report.passed += 1;
                outcome.passed.push(event);
            } else {
                report.rejected += 1;
                outcome.rejected.push(Rejection {
                    event,
                    reasons: verdict.reasons,
                });
            }
        }

        outcome
    }

    fn timestamp_problem(&self, event: &Event, now: DateTime<Utc>) -> Option<String> {
        let ts = match event.timestamp() {
            None => return Some("missing_timestamp".to_string()),
            Some(Value::String(s)) if s.is_empty() => return Some("missing_timestamp".to_string()),
            Some(Value::Bool(false)) => return Some("missing_timestamp".to_string()),
            Some(Value::String(s)) => s,
            Some(other) => return Some(format!("unparseable_timestamp: {other}")),
        };

        let Some(parsed) = strata_types::parse_timestamp(ts) else {
            let detail = DateTime::parse_from_rfc3339(ts)
                .err()
                .map_or_else(|| "invalid timestamp".to_string(), |e| e.to_string());
            return Some(format!("timestamp_parse_error: {detail} ({ts})"));
        };

        // A skew too large to add to `now` leaves no upper bound.
        let latest = now.checked_add_signed(self.config.max_future_skew);
        if latest.is_some_and(|latest| parsed > latest) {
            return Some(format!("future_timestamp: {}", parsed.to_rfc3339()));
        }
        None
    }

    fn reference_warnings(&self, event: &Event) -> Vec<String> {
        let mut warnings = Vec::new();
        let Some(payload) = event.payload() else {
            return warnings;
        };

        if let Some(users) = &self.config.known_users {
            for field in rules::USER_REFERENCE_FIELDS {
                if let Some(id) = payload.get(field).and_then(reference_text)
                    && !users.contains(&id)
                {
                    warnings.push(format!("unknown_{field}: {id}"));
                }
            }
        }

        if let Some(circles) = &self.config.known_circles
            && let Some(id) = payload.get("circle_id").and_then(reference_text)
            && !circles.contains(&id)
        {
            warnings.push(format!("unknown_circle_id: {id}"));
        }

        warnings
    }
}

/// Referenced id as text; empty strings, nulls and `false` count as absent.
fn reference_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Required paths that are absent, null or blank strings, in rule order.
pub fn missing_fields(event: &Event) -> Vec<&'static str> {
    let event_type = event.get("event_type").and_then(Value::as_str).unwrap_or_default();
    rules::BASE_REQUIRED
        .iter()
        .chain(rules::required_fields(event_type))
        .copied()
        .filter(|path| match event.get_path(path) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect()
}

/// One reason per violated range bound. Absent fields are left to completeness.
pub fn range_violations(event: &Event) -> Vec<String> {
    let event_type = event.get("event_type").and_then(Value::as_str).unwrap_or_default();
    let mut violations = Vec::new();

    for range in rules::range_checks(event_type) {
        let value = match event.get_path(range.field) {
            None | Some(Value::Null) => continue,
            Some(v) => v,
        };

        let Some(number) = coerce_f64(value) else {
            let shown = value.as_str().map_or_else(|| value.to_string(), str::to_string);
            violations.push(format!("{}: not numeric ({shown})", range.field));
            continue;
        };

        if let Some(min) = range.min
            && number <= min
        {
            violations.push(format!("{}: {number} <= {min}", range.field));
        }
        if let Some(max) = range.max
            && number > max
        {
            violations.push(format!("{}: {number} > {max}", range.field));
        }
    }

    violations
}

#[cfg(test)]
mod tests;
