//! Metadata record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_types::Layer;

/// Last committed offset for one (topic, partition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub updated_at: DateTime<Utc>,
}

/// A registered event schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub event_type: String,
    pub version: String,
    pub definition: Value,
    pub registered_at: DateTime<Utc>,
}

/// A partition written by one of the layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    pub layer: Layer,
    pub event_type: String,
    pub path: String,
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
    pub record_count: usize,
    pub size_bytes: u64,
    pub schema_version: String,
    /// Bronze partition a silver partition was derived from.
    #[serde(default)]
    pub source_partition: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit row for one processed bronze partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityResult {
    pub partition_path: String,
    pub event_type: String,
    pub total: usize,
    pub passed: usize,
    pub rejected: usize,
    pub duplicates_removed: usize,
    pub warnings: usize,
    /// Structured per-event rejection and warning detail.
    pub details: Value,
    pub processed_at: DateTime<Utc>,
}

/// A token and the encrypted value it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMapping {
    pub field: String,
    pub token: String,
    pub encrypted: String,
    pub created_at: DateTime<Utc>,
}

/// Freshness and size of a materialized gold dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldDatasetMeta {
    pub dataset: String,
    pub description: String,
    pub grain: String,
    pub refresh_schedule: String,
    pub record_count: usize,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub freshness_seconds: Option<i64>,
}
