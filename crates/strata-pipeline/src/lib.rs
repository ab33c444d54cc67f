//! # strata-pipeline: Bronze, silver and gold stages
//!
//! Events flow one way through three layers of immutable partitions:
//!
//! ```text
//!  message bus         ┌──────────────┐  bronze/  ┌─────────────────┐  silver/  ┌────────────┐  gold/
//! ───────────────────► │ BronzeBuffer │ ────────► │ SilverProcessor │ ────────► │ GoldEngine │ ──────►
//!  (topic, partition,  └──────┬───────┘           └────────┬────────┘           └─────┬──────┘
//!   offset)                   │ checkpoints                │ quality results,         │ dataset meta
//!                             ▼                            ▼ token mappings           ▼
//!                      ┌──────────────────────────────────────────────────────────────────┐
//!                      │                          MetadataStore                           │
//!                      └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`bronze`]: per-type buffers, flush triggers and offset checkpoints
//! - [`silver`]: quality gate, deduplication, tokenization and dead-letter routing
//! - [`gold`]: dataset definitions, pure aggregations and client-side queries
//!
//! Nothing here runs on its own threads. A consumer loop feeds
//! [`Pipeline::ingest`] and a scheduler calls the silver and gold stages.

use std::sync::Arc;

use strata_metadata::MetadataStore;
use strata_pii::Tokenizer;
use strata_quality::{GateConfig, QualityGate};
use strata_storage::{ObjectStore, WrittenPartition};
use strata_types::{Clock, Event};

pub mod bronze;
mod error;
pub mod gold;
pub mod silver;

pub use bronze::{BRONZE_TOPICS, BronzeBuffer, BronzeConfig, BronzeStats, topic_for_event_type};
pub use error::{PipelineError, Result};
pub use gold::{DatasetSummary, GoldEngine, GoldQuery, RefreshOutcome, RefreshStatus};
pub use silver::{PendingRun, ProcessOutcome, RejectedSample, SilverConfig, SilverProcessor, SilverStats};

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub bronze: BronzeConfig,
    pub silver: SilverConfig,
    pub gate: GateConfig,
}

/// The three stages wired to one object store and one metadata store.
pub struct Pipeline {
    bronze: BronzeBuffer,
    silver: SilverProcessor,
    gold: GoldEngine,
    metadata: Arc<dyn MetadataStore>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("bronze", &self.bronze)
            .field("silver", &self.silver)
            .field("gold", &self.gold)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        clock: Arc<dyn Clock>,
        store: ObjectStore,
        metadata: Arc<dyn MetadataStore>,
        tokenizer: Tokenizer,
    ) -> Self {
        let gate = QualityGate::new(config.gate, clock.clone());
        Self {
            bronze: BronzeBuffer::new(config.bronze, clock.clone(), store.clone(), metadata.clone()),
            silver: SilverProcessor::new(
                config.silver,
                clock.clone(),
                store.clone(),
                metadata.clone(),
                gate,
                tokenizer,
            ),
            gold: GoldEngine::new(clock, store, metadata.clone()),
            metadata,
        }
    }

    pub fn bronze(&self) -> &BronzeBuffer {
        &self.bronze
    }

    pub fn silver(&self) -> &SilverProcessor {
        &self.silver
    }

    pub fn gold(&self) -> &GoldEngine {
        &self.gold
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Buffers one consumed message; see [`BronzeBuffer::add_event`].
    pub fn ingest(&self, event: Event, topic: &str, partition: i32, offset: i64) -> Option<String> {
        self.bronze.add_event(event, topic, partition, offset)
    }

    /// Next offset a consumer should read for `(topic, partition)`.
    pub fn resume_offset(&self, topic: &str, partition: i32) -> Result<i64> {
        Ok(self.metadata.checkpoint(topic, partition)?.map_or(0, |o| o + 1))
    }

    /// Flushes every buffer. Call before the process exits.
    pub fn shutdown(&self) -> Result<Vec<WrittenPartition>> {
        let written = self.bronze.flush_all()?;
        tracing::info!(partitions = written.len(), "pipeline shut down");
        Ok(written)
    }
}
