//! Bronze ingestion buffer.
//!
//! Events land here first. Each event type has its own append-only buffer;
//! a buffer is written out as one immutable bronze partition when it reaches
//! the batch size or when the flush interval has elapsed since its last
//! flush. Consumer offsets are checkpointed only after the partition holding
//! them has been written and recorded.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use strata_metadata::{Checkpoint, MetadataStore, PartitionRecord, SchemaRecord};
use strata_quality::EventSchema;
use strata_storage::{ObjectStore, WrittenPartition, layout};
use strata_types::{BatchId, BatchPrefix, BronzeRecord, Clock, Event, EventType, IngestMeta, Layer};

use crate::error::{PipelineError, Result};

/// Topics the bronze consumer subscribes to.
pub const BRONZE_TOPICS: [&str; 10] = [
    "trebanx.transaction.events",
    "trebanx.session.events",
    "trebanx.circle.events",
    "trebanx.remittance.events",
    "trebanx.security.events",
    "lakay.fraud.alerts",
    "lakay.circles.tier-changes",
    "lakay.behavior.ato-alerts",
    "lakay.compliance.alerts",
    "lakay.compliance.edd-triggers",
];

/// Topic an event type is published on, by type prefix.
pub fn topic_for_event_type(event_type: &str) -> Option<&'static str> {
    const PREFIXES: [(&str, &str); 13] = [
        ("transaction", "trebanx.transaction.events"),
        ("session", "trebanx.session.events"),
        ("login", "trebanx.session.events"),
        ("device", "trebanx.session.events"),
        ("circle", "trebanx.circle.events"),
        ("remittance", "trebanx.remittance.events"),
        ("exchange", "trebanx.remittance.events"),
        ("account", "trebanx.security.events"),
        ("step-up", "trebanx.security.events"),
        ("fraud", "lakay.fraud.alerts"),
        ("tier", "lakay.circles.tier-changes"),
        ("ato", "lakay.behavior.ato-alerts"),
        ("compliance", "lakay.compliance.alerts"),
    ];
    if event_type.starts_with("edd") {
        return Some("lakay.compliance.edd-triggers");
    }
    PREFIXES
        .iter()
        .find(|(prefix, _)| event_type.starts_with(prefix))
        .map(|(_, topic)| *topic)
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BronzeConfig {
    /// Buffered events per type that trigger a flush.
    pub flush_batch_size: usize,
    /// Time since a type's last flush that triggers a flush.
    pub flush_interval: Duration,
}

impl Default for BronzeConfig {
    fn default() -> Self {
        Self {
            flush_batch_size: 1000,
            flush_interval: Duration::seconds(60),
        }
    }
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BronzeStats {
    pub total_events_ingested: u64,
    pub events_by_type: BTreeMap<String, u64>,
    pub partitions_created: u64,
    pub total_size_bytes: u64,
    pub buffered_events: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
struct Counters {
    total_events_ingested: u64,
    events_by_type: BTreeMap<String, u64>,
    partitions_created: u64,
    total_size_bytes: u64,
}

// ============================================================================
// Buffer
// ============================================================================

#[derive(Debug)]
struct TypeBuffer {
    records: Vec<BronzeRecord>,
    last_flush: DateTime<Utc>,
}

/// Offset bookkeeping for one `(topic, partition)`.
#[derive(Debug, Default)]
struct OffsetTracker {
    /// Offsets sitting in some type buffer, with multiplicity.
    buffered: BTreeMap<i64, usize>,
    flushed_high: Option<i64>,
}

impl OffsetTracker {
    fn hold(&mut self, offset: i64) {
        *self.buffered.entry(offset).or_insert(0) += 1;
    }

    fn release(&mut self, offset: i64) {
        if let Some(count) = self.buffered.get_mut(&offset) {
            *count -= 1;
            if *count == 0 {
                self.buffered.remove(&offset);
            }
        }
        self.flushed_high = Some(self.flushed_high.map_or(offset, |h| h.max(offset)));
    }

    /// Highest offset below which nothing is still buffered.
    fn committable(&self) -> Option<i64> {
        let high = self.flushed_high?;
        let offset = match self.buffered.keys().next() {
            Some(lowest) => high.min(lowest - 1),
            None => high,
        };
        (offset >= 0).then_some(offset)
    }
}

/// Per-type event buffers with size and time flush triggers.
///
/// Safe to share between consumer threads. Each type's buffer has its own
/// lock, held for the whole flush, so one type is never flushed twice at
/// once while other types flush independently.
pub struct BronzeBuffer {
    config: BronzeConfig,
    clock: Arc<dyn Clock>,
    store: ObjectStore,
    metadata: Arc<dyn MetadataStore>,
    buffers: Mutex<HashMap<EventType, Arc<Mutex<TypeBuffer>>>>,
    offsets: Mutex<HashMap<(String, i32), OffsetTracker>>,
    counters: Mutex<Counters>,
}

impl std::fmt::Debug for BronzeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BronzeBuffer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BronzeBuffer {
    pub fn new(
        config: BronzeConfig,
        clock: Arc<dyn Clock>,
        store: ObjectStore,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            config,
            clock,
            store,
            metadata,
            buffers: Mutex::new(HashMap::new()),
            offsets: Mutex::new(HashMap::new()),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn config(&self) -> &BronzeConfig {
        &self.config
    }

    fn buffer_for(&self, event_type: &EventType) -> Arc<Mutex<TypeBuffer>> {
        let now = self.clock.now();
        lock(&self.buffers)
            .entry(event_type.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(TypeBuffer {
                    records: Vec::new(),
                    last_flush: now,
                }))
            })
            .clone()
    }

    /// Buffers one consumed event and flushes its type if a trigger fires.
    ///
    /// Returns the key of the partition written by a triggered flush. A failed
    /// flush is logged and leaves the event buffered for the next attempt.
    pub fn add_event(&self, event: Event, topic: &str, partition: i32, offset: i64) -> Option<String> {
        let event_type = event.event_type();
        let now = self.clock.now();
        let buffer = self.buffer_for(&event_type);
        let mut guard = lock(&buffer);

        guard.records.push(BronzeRecord::new(
            event,
            IngestMeta {
                ingested_at: now,
                source_topic: topic.to_string(),
                partition,
                offset,
            },
        ));
        lock(&self.offsets)
            .entry((topic.to_string(), partition))
            .or_default()
            .hold(offset);
        {
            let mut counters = lock(&self.counters);
            counters.total_events_ingested += 1;
            *counters
                .events_by_type
                .entry(event_type.to_string())
                .or_insert(0) += 1;
        }

        let size_due = guard.records.len() >= self.config.flush_batch_size;
        let time_due = now - guard.last_flush >= self.config.flush_interval;
        if !size_due && !time_due {
            return None;
        }

        match self.flush_locked(&event_type, &mut guard) {
            Ok(written) => written.map(|w| w.key),
            Err(e) => {
                tracing::warn!(
                    event_type = %event_type,
                    record_count = guard.records.len(),
                    error = %e,
                    "bronze flush failed; records kept for retry"
                );
                None
            }
        }
    }

    /// Flushes one type's buffer. Returns `None` if it was empty.
    pub fn flush(&self, event_type: &EventType) -> Result<Option<WrittenPartition>> {
        let buffer = lock(&self.buffers).get(event_type).cloned();
        let Some(buffer) = buffer else {
            return Ok(None);
        };
        let mut guard = lock(&buffer);
        self.flush_locked(event_type, &mut guard)
    }

    /// Flushes every non-empty buffer.
    ///
    /// Every type is attempted; if any failed, the first error is returned
    /// after the rest have been flushed.
    pub fn flush_all(&self) -> Result<Vec<WrittenPartition>> {
        self.flush_where(|_, _| true)
    }

    /// Flushes the types whose interval has elapsed, for idle ticks with no new events.
    pub fn flush_due(&self) -> Result<Vec<WrittenPartition>> {
        let now = self.clock.now();
        let interval = self.config.flush_interval;
        self.flush_where(|buffer, _| now - buffer.last_flush >= interval)
    }

    fn flush_where(&self, due: impl Fn(&TypeBuffer, &EventType) -> bool) -> Result<Vec<WrittenPartition>> {
        let mut buffers: Vec<(EventType, Arc<Mutex<TypeBuffer>>)> = lock(&self.buffers)
            .iter()
            .map(|(t, b)| (t.clone(), b.clone()))
            .collect();
        buffers.sort_by(|a, b| a.0.cmp(&b.0));

        let mut written = Vec::new();
        let mut first_error = None;
        for (event_type, buffer) in buffers {
            let mut guard = lock(&buffer);
            if guard.records.is_empty() || !due(&*guard, &event_type) {
                continue;
            }
            match self.flush_locked(&event_type, &mut guard) {
                Ok(Some(w)) => written.push(w),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        event_type = %event_type,
                        record_count = guard.records.len(),
                        error = %e,
                        "bronze flush failed; records kept for retry"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    /// Writes and records the buffer. The buffer is cleared only once both
    /// the partition and its record are durable.
    fn flush_locked(&self, event_type: &EventType, buffer: &mut TypeBuffer) -> Result<Option<WrittenPartition>> {
        if buffer.records.is_empty() {
            return Ok(None);
        }

        let now = self.clock.now();
        let table = layout::bronze_table(&buffer.records);
        let batch_id = BatchId::generate(BatchPrefix::Batch);
        let written = self
            .store
            .write_batch(&table, Layer::Bronze, event_type.as_str(), now, &batch_id)?;

        let (date_start, date_end) = event_time_range(&buffer.records).unwrap_or((now, now));
        let schema_version = buffer.records[0].event.event_version().to_string();
        self.metadata.record_partition(PartitionRecord {
            layer: Layer::Bronze,
            event_type: event_type.to_string(),
            path: written.key.clone(),
            date_start,
            date_end,
            record_count: written.record_count,
            size_bytes: written.size_bytes,
            schema_version,
            source_partition: None,
            created_at: now,
        })?;

        let flushed = std::mem::take(&mut buffer.records);
        buffer.last_flush = now;
        {
            let mut counters = lock(&self.counters);
            counters.partitions_created += 1;
            counters.total_size_bytes += written.size_bytes;
        }
        tracing::info!(
            event_type = %event_type,
            key = %written.key,
            record_count = written.record_count,
            size_bytes = written.size_bytes,
            "bronze flush"
        );

        self.commit_offsets(&flushed, now);
        Ok(Some(written))
    }

    /// Commits, per `(topic, partition)` touched by this flush, the highest
    /// offset flushed so far, held back below any offset still buffered.
    fn commit_offsets(&self, flushed: &[BronzeRecord], now: DateTime<Utc>) {
        let mut commits = Vec::new();
        {
            let mut tracked = lock(&self.offsets);
            let mut touched = BTreeSet::new();
            for record in flushed {
                let slot = (record.meta.source_topic.clone(), record.meta.partition);
                let tracker = tracked.entry(slot.clone()).or_default();
                tracker.release(record.meta.offset);
                touched.insert(slot);
            }
            for slot in touched {
                if let Some(offset) = tracked.get(&slot).and_then(OffsetTracker::committable) {
                    commits.push((slot, offset));
                }
            }
        }

        for ((topic, partition), offset) in commits {
            let checkpoint = Checkpoint {
                topic: topic.clone(),
                partition,
                offset,
                updated_at: now,
            };
            if let Err(e) = self.metadata.commit_checkpoint(checkpoint) {
                tracing::warn!(topic = %topic, partition, offset, error = %e, "checkpoint commit failed");
            }
        }
    }

    pub fn buffered(&self, event_type: &EventType) -> usize {
        lock(&self.buffers)
            .get(event_type)
            .cloned()
            .map_or(0, |b| lock(&b).records.len())
    }

    pub fn stats(&self) -> BronzeStats {
        let buffers: Vec<(EventType, Arc<Mutex<TypeBuffer>>)> = lock(&self.buffers)
            .iter()
            .map(|(t, b)| (t.clone(), b.clone()))
            .collect();
        let buffered_events = buffers
            .into_iter()
            .map(|(t, b)| (t.to_string(), lock(&b).records.len()))
            .collect();

        let counters = lock(&self.counters);
        BronzeStats {
            total_events_ingested: counters.total_events_ingested,
            events_by_type: counters.events_by_type.clone(),
            partitions_created: counters.partitions_created,
            total_size_bytes: counters.total_size_bytes,
            buffered_events,
        }
    }

    /// Committed offsets as topic, then partition, to offset.
    pub fn checkpoints(&self) -> Result<BTreeMap<String, BTreeMap<i32, i64>>> {
        let mut out: BTreeMap<String, BTreeMap<i32, i64>> = BTreeMap::new();
        for c in self.metadata.checkpoints()? {
            out.entry(c.topic).or_default().insert(c.partition, c.offset);
        }
        Ok(out)
    }

    /// Registers a schema definition; returns false if `(event_type, version)` exists.
    /// Registers a JSON Schema for `event_type`. Definitions that do not
    /// compile are refused.
    pub fn register_schema(&self, event_type: &str, version: &str, definition: Value) -> Result<bool> {
        EventSchema::compile(&definition).map_err(|source| PipelineError::InvalidSchema {
            event_type: event_type.to_string(),
            source,
        })?;
        let registered = self.metadata.register_schema(SchemaRecord {
            event_type: event_type.to_string(),
            version: version.to_string(),
            definition,
            registered_at: self.clock.now(),
        })?;
        Ok(registered)
    }

    pub fn schemas(&self, event_type: Option<&str>) -> Result<Vec<SchemaRecord>> {
        Ok(self.metadata.schemas(event_type)?)
    }
}

fn event_time_range(records: &[BronzeRecord]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut times = records.iter().filter_map(|r| r.event.parsed_timestamp());
    let first = times.next()?;
    Some(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
}
