//! Gold dataset definitions.

use chrono::{DateTime, Utc};
use strata_storage::Row;
use strata_types::Event;

use super::aggregations;

/// A pure aggregation: the same events and `as_of` always give the same rows.
pub type AggregateFn = fn(&[Event], DateTime<Utc>) -> Vec<Row>;

/// A named materialized dataset.
#[derive(Debug, Clone, Copy)]
pub struct DatasetDef {
    pub name: &'static str,
    pub description: &'static str,
    pub grain: &'static str,
    pub refresh_schedule: &'static str,
    pub source_event_types: &'static [&'static str],
    pub aggregate: AggregateFn,
}

pub const DATASETS: [DatasetDef; 6] = [
    DatasetDef {
        name: "daily-transaction-summary",
        description: "Per-user, per-day transaction metrics",
        grain: "per-user, per-day",
        refresh_schedule: "daily",
        source_event_types: &["transaction-initiated", "transaction-completed", "transaction-failed"],
        aggregate: aggregations::daily_transactions,
    },
    DatasetDef {
        name: "circle-lifecycle-summary",
        description: "Per-circle lifecycle and health metrics",
        grain: "per-circle",
        refresh_schedule: "daily",
        source_event_types: &["circle-created", "circle-member-joined", "circle-member-dropped"],
        aggregate: aggregations::circle_lifecycle,
    },
    DatasetDef {
        name: "user-risk-dashboard",
        description: "Per-user risk metrics across fraud, compliance, behavior",
        grain: "per-user",
        refresh_schedule: "daily",
        source_event_types: &["transaction-initiated", "session-started"],
        aggregate: aggregations::user_risk,
    },
    DatasetDef {
        name: "compliance-reporting",
        description: "Per-day compliance metrics for BSA officer dashboard",
        grain: "per-day, per-metric",
        refresh_schedule: "daily",
        source_event_types: &["transaction-initiated", "transaction-completed"],
        aggregate: aggregations::compliance_reporting,
    },
    DatasetDef {
        name: "platform-health",
        description: "Per-day platform-wide health metrics",
        grain: "per-day",
        refresh_schedule: "hourly",
        source_event_types: &[
            "transaction-initiated",
            "session-started",
            "circle-created",
            "remittance-initiated",
        ],
        aggregate: aggregations::platform_health,
    },
    DatasetDef {
        name: "haiti-corridor-analytics",
        description: "Per-day, per-corridor remittance analytics",
        grain: "per-day, per-corridor-segment",
        refresh_schedule: "daily",
        source_event_types: &["remittance-initiated", "remittance-completed", "remittance-failed"],
        aggregate: aggregations::haiti_corridor,
    },
];

pub fn dataset(name: &str) -> Option<&'static DatasetDef> {
    DATASETS.iter().find(|d| d.name == name)
}
