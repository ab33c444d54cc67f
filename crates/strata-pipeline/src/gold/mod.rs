//! Gold aggregation engine.
//!
//! A refresh reads every silver partition of a dataset's source types, runs
//! the dataset's aggregation and appends the result as a new gold partition.
//! Gold partitions are never replaced, so overlapping refreshes leave
//! overlapping rows; readers choose between all partitions and the newest.

pub mod aggregations;
pub mod datasets;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use strata_metadata::{GoldDatasetMeta, MetadataStore, PartitionRecord};
use strata_storage::{ObjectStore, Row, Table, layout};
use strata_types::{BatchId, BatchPrefix, Clock, DEFAULT_EVENT_VERSION, Event, Layer};

pub use datasets::{DATASETS, DatasetDef, dataset};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Refreshed,
    /// No silver events in range; nothing written.
    NoData,
    /// The aggregation produced no rows; nothing written.
    NoResults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub dataset: String,
    pub status: RefreshStatus,
    pub records: usize,
    pub key: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl RefreshOutcome {
    fn skipped(dataset: &str, status: RefreshStatus) -> Self {
        Self {
            dataset: dataset.to_string(),
            status,
            records: 0,
            key: None,
            refreshed_at: None,
        }
    }
}

/// Client-side filters applied by [`GoldEngine::query`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoldQuery {
    /// Column equality filters, compared as JSON values.
    pub filters: Vec<(String, Value)>,
    /// Inclusive bounds on the `date` column, compared as text.
    pub date_range: Option<(String, String)>,
    /// Read only the newest partition instead of all of them.
    pub latest_partition_only: bool,
}

impl GoldQuery {
    fn matches(&self, row: &Row) -> bool {
        let filters_match = self
            .filters
            .iter()
            .all(|(column, expected)| row.get(column) == Some(expected));
        if !filters_match {
            return false;
        }
        match &self.date_range {
            None => true,
            Some((start, end)) => match row.get("date") {
                Some(Value::String(d)) => start.as_str() <= d.as_str() && d.as_str() <= end.as_str(),
                Some(Value::Null) | None => false,
                Some(other) => {
                    let d = other.to_string();
                    *start <= d && d <= *end
                }
            },
        }
    }
}

/// A dataset definition merged with its refresh metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub dataset: String,
    pub description: String,
    pub grain: String,
    pub refresh_schedule: String,
    pub source_event_types: Vec<String>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub record_count: usize,
    pub freshness_seconds: Option<i64>,
}

pub struct GoldEngine {
    clock: Arc<dyn Clock>,
    store: ObjectStore,
    metadata: Arc<dyn MetadataStore>,
}

impl std::fmt::Debug for GoldEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoldEngine").finish_non_exhaustive()
    }
}

fn lookup(name: &str) -> Result<&'static DatasetDef> {
    dataset(name).ok_or_else(|| PipelineError::UnknownDataset {
        dataset: name.to_string(),
    })
}

impl GoldEngine {
    pub fn new(clock: Arc<dyn Clock>, store: ObjectStore, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { clock, store, metadata }
    }

    /// Reads every readable silver event of `event_type`.
    fn silver_events(&self, event_type: &str) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for partition in self.store.list_partitions(Layer::Silver, Some(event_type), None)? {
            match self.store.read_partition(&partition.key) {
                Ok(table) => events.extend(layout::events_from_table(&table).0),
                Err(e) => {
                    tracing::warn!(key = %partition.key, error = %e, "unreadable silver partition skipped");
                }
            }
        }
        Ok(events)
    }

    /// Rebuilds one dataset from silver, optionally limited to events whose
    /// timestamp lies in `range`. Events with unparseable timestamps are kept.
    pub fn refresh(&self, name: &str, range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> Result<RefreshOutcome> {
        let def = lookup(name)?;

        let mut events = Vec::new();
        for event_type in def.source_event_types {
            events.extend(self.silver_events(event_type)?);
        }
        if let Some((start, end)) = range {
            events.retain(|e| e.parsed_timestamp().is_none_or(|ts| start <= ts && ts <= end));
        }
        if events.is_empty() {
            tracing::info!(dataset = name, "gold no data");
            return Ok(RefreshOutcome::skipped(name, RefreshStatus::NoData));
        }

        let now = self.clock.now();
        let rows = (def.aggregate)(&events, now);
        if rows.is_empty() {
            tracing::info!(dataset = name, "gold no results");
            return Ok(RefreshOutcome::skipped(name, RefreshStatus::NoResults));
        }

        let table = Table::infer(rows);
        let batch_id = BatchId::generate(BatchPrefix::Gold);
        let written = self.store.write_batch(&table, Layer::Gold, name, now, &batch_id)?;

        let mut times = events.iter().filter_map(Event::parsed_timestamp);
        let span = times
            .next()
            .map(|first| times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))));
        let (date_start, date_end) = span.unwrap_or((now, now));
        self.metadata.record_partition(PartitionRecord {
            layer: Layer::Gold,
            event_type: name.to_string(),
            path: written.key.clone(),
            date_start,
            date_end,
            record_count: written.record_count,
            size_bytes: written.size_bytes,
            schema_version: DEFAULT_EVENT_VERSION.to_string(),
            source_partition: None,
            created_at: now,
        })?;
        self.metadata.upsert_gold_meta(GoldDatasetMeta {
            dataset: name.to_string(),
            description: def.description.to_string(),
            grain: def.grain.to_string(),
            refresh_schedule: def.refresh_schedule.to_string(),
            record_count: written.record_count,
            last_refreshed_at: Some(now),
            freshness_seconds: span.map(|(_, newest)| (now - newest).num_seconds()),
        })?;

        tracing::info!(
            dataset = name,
            key = %written.key,
            record_count = written.record_count,
            "gold refreshed"
        );
        Ok(RefreshOutcome {
            dataset: name.to_string(),
            status: RefreshStatus::Refreshed,
            records: written.record_count,
            key: Some(written.key),
            refreshed_at: Some(now),
        })
    }

    /// Refreshes every dataset in definition order.
    pub fn refresh_all(&self) -> Result<Vec<RefreshOutcome>> {
        DATASETS.iter().map(|d| self.refresh(d.name, None)).collect()
    }

    /// Rows of a dataset, filtered client-side.
    pub fn query(&self, name: &str, query: &GoldQuery) -> Result<Vec<Row>> {
        lookup(name)?;
        let mut partitions = self.store.list_partitions(Layer::Gold, Some(name), None)?;
        if query.latest_partition_only {
            partitions = partitions.pop().into_iter().collect();
        }

        let mut rows = Vec::new();
        for partition in partitions {
            match self.store.read_partition(&partition.key) {
                Ok(table) => rows.extend(table.into_rows().into_iter().filter(|r| query.matches(r))),
                Err(e) => tracing::warn!(key = %partition.key, error = %e, "unreadable gold partition skipped"),
            }
        }
        Ok(rows)
    }

    pub fn datasets(&self) -> Result<Vec<DatasetSummary>> {
        DATASETS
            .iter()
            .map(|def| {
                let meta = self.metadata.gold_meta(def.name)?;
                Ok(DatasetSummary {
                    dataset: def.name.to_string(),
                    description: def.description.to_string(),
                    grain: def.grain.to_string(),
                    refresh_schedule: def.refresh_schedule.to_string(),
                    source_event_types: def.source_event_types.iter().map(ToString::to_string).collect(),
                    last_refreshed_at: meta.as_ref().and_then(|m| m.last_refreshed_at),
                    record_count: meta.as_ref().map_or(0, |m| m.record_count),
                    freshness_seconds: meta.and_then(|m| m.freshness_seconds),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn query_filters_compare_json_values() {
        let q = GoldQuery {
            filters: vec![("user_id".into(), json!("u-1")), ("transaction_count".into(), json!(2))],
            ..GoldQuery::default()
        };
        assert!(q.matches(&row(json!({"user_id": "u-1", "transaction_count": 2}))));
        assert!(!q.matches(&row(json!({"user_id": "u-1", "transaction_count": "2"}))));
        assert!(!q.matches(&row(json!({"user_id": "u-1"}))));
    }

    #[test]
    fn date_range_is_inclusive_and_requires_date() {
        let q = GoldQuery {
            date_range: Some(("2026-03-01".into(), "2026-03-02".into())),
            ..GoldQuery::default()
        };
        assert!(q.matches(&row(json!({"date": "2026-03-01"}))));
        assert!(q.matches(&row(json!({"date": "2026-03-02"}))));
        assert!(!q.matches(&row(json!({"date": "2026-03-03"}))));
        assert!(!q.matches(&row(json!({"corridor": "US->HT"}))));
    }

    #[test]
    fn unknown_dataset_is_rejected() {
        assert!(matches!(lookup("weekly-fun"), Err(PipelineError::UnknownDataset { .. })));
        assert_eq!(DATASETS.len(), 6);
        assert!(dataset("platform-health").is_some_and(|d| d.refresh_schedule == "hourly"));
    }
}
