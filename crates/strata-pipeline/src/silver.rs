//! Silver processor: bronze partitions to cleaned, de-identified partitions.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use strata_metadata::{MetadataStore, PartitionRecord, QualityResult};
use strata_pii::Tokenizer;
use strata_quality::{EventSchema, GateOutcome, QualityGate};
use strata_storage::{ObjectStore, key, layout};
use strata_types::{BatchId, BatchPrefix, Clock, Event, EventType, Layer, Rejection};

use crate::error::Result;

/// Most recent quality results returned by [`SilverProcessor::quality_results`].
pub const QUALITY_RESULTS_LIMIT: usize = 50;

/// Dead-letter partitions read by [`SilverProcessor::rejected_samples`].
pub const REJECTED_SAMPLE_PARTITIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilverConfig {
    /// Rejection rate above which a processed batch is logged as unhealthy.
    pub rejection_rate_threshold: f64,
}

impl Default for SilverConfig {
    fn default() -> Self {
        Self {
            rejection_rate_threshold: 0.10,
        }
    }
}

/// What processing one bronze partition produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub source_partition: String,
    pub event_type: String,
    pub total: usize,
    pub passed: usize,
    pub rejected: usize,
    pub duplicates_removed: usize,
    pub warnings: usize,
    pub silver_key: Option<String>,
    pub rejected_key: Option<String>,
}

/// Result of a sweep over unprocessed bronze partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingRun {
    pub processed: Vec<ProcessOutcome>,
    /// Partitions that failed and stay pending.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeStats {
    pub processed: u64,
    pub passed: u64,
    pub rejected: u64,
    pub deduplicated: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SilverStats {
    pub partitions_processed: u64,
    pub total: TypeStats,
    pub by_type: BTreeMap<String, TypeStats>,
}

/// One dead-letter row as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedSample {
    pub event_id: String,
    pub event_type: String,
    pub rejection_reasons: Vec<String>,
}

/// Keeps the first event per `(event_id, timestamp)`; returns survivors and
/// the number of duplicates dropped.
pub fn deduplicate(events: Vec<Event>) -> (Vec<Event>, usize) {
    let mut seen = HashSet::with_capacity(events.len());
    let before = events.len();
    let unique: Vec<Event> = events
        .into_iter()
        .filter(|e| seen.insert(e.dedup_key()))
        .collect();
    let removed = before - unique.len();
    (unique, removed)
}

/// Event type encoded in a bronze key (`bronze/{event_type}/...`).
fn key_event_type(key: &str) -> Option<EventType> {
    let mut segments = key.split('/');
    segments.next()?;
    segments.next().filter(|s| !s.is_empty()).map(EventType::from)
}

pub struct SilverProcessor {
    config: SilverConfig,
    clock: Arc<dyn Clock>,
    store: ObjectStore,
    metadata: Arc<dyn MetadataStore>,
    gate: QualityGate,
    tokenizer: Tokenizer,
    stats: Mutex<SilverStats>,
}

impl std::fmt::Debug for SilverProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SilverProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SilverProcessor {
    pub fn new(
        config: SilverConfig,
        clock: Arc<dyn Clock>,
        store: ObjectStore,
        metadata: Arc<dyn MetadataStore>,
        gate: QualityGate,
        tokenizer: Tokenizer,
    ) -> Self {
        Self {
            config,
            clock,
            store,
            metadata,
            gate,
            tokenizer,
            stats: Mutex::new(SilverStats::default()),
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Processes one bronze partition end to end.
    ///
    /// A read failure returns the error and records nothing, leaving the
    /// partition pending. A partition with no readable events still records a
    /// quality result so it is not picked up again.
    pub fn process_partition(&self, bronze_key: &str) -> Result<ProcessOutcome> {
        let table = self.store.read_partition(bronze_key)?;
        let (events, skipped) = layout::events_from_table(&table);
        if skipped > 0 {
            tracing::warn!(key = %bronze_key, skipped, "unparseable bronze rows skipped");
        }

        let event_type = key_event_type(bronze_key)
            .or_else(|| events.first().map(Event::event_type))
            .unwrap_or_else(EventType::unknown);
        let schema = self
            .metadata
            .schemas(Some(event_type.as_str()))?
            .into_iter()
            .next()
            .and_then(|s| match EventSchema::compile(&s.definition) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    tracing::warn!(event_type = %event_type, version = %s.version, error = %e, "stored schema ignored");
                    None
                }
            });

        let now = self.clock.now();
        let GateOutcome { passed, rejected, report } = self.gate.run(events, schema.as_ref());
        let (unique, duplicates_removed) = deduplicate(passed);
        if duplicates_removed > 0 {
            tracing::info!(key = %bronze_key, duplicates_removed, "duplicates removed");
        }

        let tokenized = unique
            .iter()
            .map(|e| self.tokenizer.tokenize_event(e, event_type.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.persist_mappings(now)?;

        // A retry after a later step failed finds the silver output already
        // recorded against this bronze partition.
        let existing = self
            .metadata
            .derived_partitions(bronze_key)?
            .into_iter()
            .find(|p| p.layer == Layer::Silver);
        let silver_key = match existing {
            Some(record) => {
                tracing::info!(key = %bronze_key, silver_key = %record.path, "silver partition already written");
                Some(record.path)
            }
            None if tokenized.is_empty() => None,
            None => Some(self.write_silver(&tokenized, &event_type, bronze_key, now)?),
        };
        let rejected_key = if rejected.is_empty() {
            None
        } else {
            Some(self.write_rejected(&rejected, &event_type, bronze_key, now)?)
        };

        let outcome = ProcessOutcome {
            source_partition: bronze_key.to_string(),
            event_type: event_type.to_string(),
            total: report.total,
            passed: tokenized.len(),
            rejected: rejected.len(),
            duplicates_removed,
            warnings: report.warnings,
            silver_key,
            rejected_key,
        };

        let details = json!({
            "rejections": rejected
                .iter()
                .map(|r| json!({"event_id": r.event.event_id(), "reasons": r.reasons}))
                .collect::<Vec<_>>(),
            "warnings": report.warning_details,
            "skipped_rows": skipped,
        });
        self.metadata.record_quality(QualityResult {
            partition_path: bronze_key.to_string(),
            event_type: outcome.event_type.clone(),
            total: outcome.total,
            passed: outcome.passed,
            rejected: outcome.rejected,
            duplicates_removed,
            warnings: outcome.warnings,
            details,
            processed_at: now,
        })?;

        if outcome.total > 0 {
            let rate = outcome.rejected as f64 / outcome.total as f64;
            if rate > self.config.rejection_rate_threshold {
                tracing::warn!(
                    key = %bronze_key,
                    event_type = %event_type,
                    rejection_rate = rate,
                    threshold = self.config.rejection_rate_threshold,
                    "high rejection rate"
                );
            }
        }

        self.bump_stats(&outcome);
        tracing::info!(
            key = %bronze_key,
            event_type = %event_type,
            total = outcome.total,
            passed = outcome.passed,
            rejected = outcome.rejected,
            duplicates_removed,
            "silver partition processed"
        );
        Ok(outcome)
    }

    /// Persists mappings produced so far; on failure they are queued again.
    fn persist_mappings(&self, now: DateTime<Utc>) -> Result<()> {
        let mappings = self.tokenizer.take_mappings(now);
        if mappings.is_empty() {
            return Ok(());
        }
        match self.metadata.save_token_mappings(&mappings) {
            Ok(inserted) => {
                tracing::debug!(inserted, "token mappings saved");
                Ok(())
            }
            Err(e) => {
                self.tokenizer.restore_mappings(mappings);
                Err(e.into())
            }
        }
    }

    fn write_silver(
        &self,
        events: &[Event],
        event_type: &EventType,
        bronze_key: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let table = layout::silver_table(events, now);
        let batch_id = BatchId::generate(BatchPrefix::Batch);
        let written = self
            .store
            .write_batch(&table, Layer::Silver, event_type.as_str(), now, &batch_id)?;

        let mut times = events.iter().filter_map(Event::parsed_timestamp);
        let (date_start, date_end) = times
            .next()
            .map(|first| times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
            .unwrap_or((now, now));
        self.metadata.record_partition(PartitionRecord {
            layer: Layer::Silver,
            event_type: event_type.to_string(),
            path: written.key.clone(),
            date_start,
            date_end,
            record_count: written.record_count,
            size_bytes: written.size_bytes,
            schema_version: events[0].event_version().to_string(),
            source_partition: Some(bronze_key.to_string()),
            created_at: now,
        })?;
        Ok(written.key)
    }

    /// Writes the dead-letter partition under a key derived from the bronze
    /// partition, so reprocessing replaces it instead of adding another.
    fn write_rejected(
        &self,
        rejected: &[Rejection],
        event_type: &EventType,
        bronze_key: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let table = layout::rejected_table(rejected, event_type.as_str(), now);
        let key = key::rejected_key_for(event_type.as_str(), bronze_key).unwrap_or_else(|| {
            key::rejected_key(event_type.as_str(), now, &BatchId::generate(BatchPrefix::Rejected))
        });
        let written = self.store.write_table(&key, &table)?;
        tracing::info!(
            key = %written.key,
            event_type = %event_type,
            record_count = written.record_count,
            "dead-letter written"
        );
        Ok(written.key)
    }

    fn bump_stats(&self, outcome: &ProcessOutcome) {
        let mut guard = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let stats = &mut *guard;
        stats.partitions_processed += 1;
        let per_type = stats.by_type.entry(outcome.event_type.clone()).or_default();
        for s in [per_type, &mut stats.total] {
            s.processed += outcome.total as u64;
            s.passed += outcome.passed as u64;
            s.rejected += outcome.rejected as u64;
            s.deduplicated += outcome.duplicates_removed as u64;
        }
    }

    /// Bronze partitions recorded but not yet processed, in partition order.
    pub fn pending_partitions(&self, event_type: Option<&str>) -> Result<Vec<PartitionRecord>> {
        let processed = self.metadata.processed_partition_paths()?;
        let mut pending: Vec<PartitionRecord> = self
            .metadata
            .partitions(Some(Layer::Bronze), event_type)?
            .into_iter()
            .filter(|p| !processed.contains(&p.path))
            .collect();
        pending.sort_by(|a, b| key::compare_keys(&a.path, &b.path));
        Ok(pending)
    }

    /// Processes every pending bronze partition. Failures are logged and the
    /// partition stays pending for the next run.
    pub fn process_pending(&self, event_type: Option<&str>) -> Result<PendingRun> {
        let mut run = PendingRun::default();
        for partition in self.pending_partitions(event_type)? {
            match self.process_partition(&partition.path) {
                Ok(outcome) => run.processed.push(outcome),
                Err(e) => {
                    tracing::warn!(
                        key = %partition.path,
                        error = %e,
                        transient = e.is_transient(),
                        "bronze partition skipped"
                    );
                    run.failed.push(partition.path);
                }
            }
        }
        Ok(run)
    }

    pub fn stats(&self) -> SilverStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Newest quality results, optionally for one type.
    pub fn quality_results(&self, event_type: Option<&str>) -> Result<Vec<QualityResult>> {
        Ok(self.metadata.quality_results(event_type, QUALITY_RESULTS_LIMIT)?)
    }

    /// Up to `limit` rows from the newest dead-letter partitions.
    pub fn rejected_samples(&self, event_type: Option<&str>, limit: usize) -> Result<Vec<RejectedSample>> {
        let partitions = self.store.list_prefix(&key::rejected_prefix(event_type))?;
        let mut samples = Vec::new();

        for partition in partitions.iter().rev().take(REJECTED_SAMPLE_PARTITIONS) {
            let table = match self.store.read_partition(&partition.key) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(key = %partition.key, error = %e, "unreadable dead-letter partition skipped");
                    continue;
                }
            };
            for row in table.rows() {
                if samples.len() >= limit {
                    return Ok(samples);
                }
                let text = |field: &str| row.get(field).and_then(Value::as_str).unwrap_or_default().to_string();
                let reasons = row
                    .get("rejection_reasons")
                    .and_then(Value::as_str)
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_default();
                samples.push(RejectedSample {
                    event_id: text("event_id"),
                    event_type: text("event_type"),
                    rejection_reasons: reasons,
                });
            }
        }
        Ok(samples)
    }
}
