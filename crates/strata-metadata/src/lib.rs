//! # strata-metadata: Pipeline metadata store
//!
//! Holds the state the pipeline keeps apart from partition bytes:
//!
//! - [`Checkpoint`]: last committed bus offset per (topic, partition)
//! - [`SchemaRecord`]: registered event schema versions
//! - [`PartitionRecord`]: every partition a layer has written
//! - [`QualityResult`]: audit row per processed bronze partition
//! - [`TokenMapping`]: token to encrypted original value
//! - [`GoldDatasetMeta`]: freshness of materialized datasets
//!
//! Components depend on the [`MetadataStore`] trait; [`SqliteMetadataStore`]
//! is the provided implementation.

mod error;
mod records;
mod store;

pub use error::{MetadataError, Result};
pub use records::{Checkpoint, GoldDatasetMeta, PartitionRecord, QualityResult, SchemaRecord, TokenMapping};
pub use store::{DATABASE_FILE, MetadataStore, SqliteMetadataStore};
