//! The columnar object store.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use strata_io::BlobStore;
use strata_types::{BatchId, Layer};

use crate::codec::{self, Compression, Table};
use crate::error::StorageError;
use crate::key::{self, PARTITION_EXT};

/// A stored partition as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionInfo {
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}

/// Result of writing one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPartition {
    pub key: String,
    pub size_bytes: u64,
    pub record_count: usize,
}

/// Aggregate size of one layer.
///
/// Dead-letter partitions live under `silver/` but are counted apart from
/// silver data; both dead-letter fields are zero for other layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayerStats {
    pub layer: Layer,
    pub partition_count: usize,
    pub total_size_bytes: u64,
    pub dead_letter_count: usize,
    pub dead_letter_size_bytes: u64,
}

/// Parquet partitions on top of a [`BlobStore`].
///
/// Partitions are immutable once written; every write targets a fresh key.
#[derive(Clone)]
pub struct ObjectStore {
    blobs: Arc<dyn BlobStore>,
    compression: Compression,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

impl ObjectStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            compression: Compression::default(),
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Encodes `table` and stores it under the layer's key scheme.
    pub fn write_batch(
        &self,
        table: &Table,
        layer: Layer,
        name: &str,
        at: DateTime<Utc>,
        batch_id: &BatchId,
    ) -> Result<WrittenPartition, StorageError> {
        let key = key::partition_key(layer, name, at, batch_id);
        let written = self.write_table(&key, table)?;
        tracing::info!(
            layer = %layer,
            key = %written.key,
            record_count = written.record_count,
            size_bytes = written.size_bytes,
            "partition written"
        );
        Ok(written)
    }

    /// Encodes `table` and stores it under an explicit key.
    pub fn write_table(&self, key: &str, table: &Table) -> Result<WrittenPartition, StorageError> {
        let bytes = codec::encode(table, self.compression)?;
        let size_bytes = self.write_key(key, bytes)?;
        Ok(WrittenPartition {
            key: key.to_string(),
            size_bytes,
            record_count: table.num_rows(),
        })
    }

    /// Stores raw bytes under `key`, returning their size.
    pub fn write_key(&self, key: &str, data: Bytes) -> Result<u64, StorageError> {
        let size = data.len() as u64;
        self.blobs.put(key, data)?;
        Ok(size)
    }

    pub fn read_partition(&self, key: &str) -> Result<Table, StorageError> {
        let bytes = self.blobs.get(key)?;
        codec::decode(&bytes).map_err(|e| match e {
            StorageError::Parquet(reason) => StorageError::Corrupt {
                key: key.to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Lists `.parquet` objects under `prefix`, or under the layer (narrowed to
    /// `name` when given), in partition order.
    pub fn list_partitions(
        &self,
        layer: Layer,
        name: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<Vec<PartitionInfo>, StorageError> {
        let search = match prefix {
            Some(p) => p.to_string(),
            None => key::layer_prefix(layer, name),
        };
        self.list_prefix(&search)
    }

    /// Lists `.parquet` objects under an arbitrary prefix in partition order.
    pub fn list_prefix(&self, prefix: &str) -> Result<Vec<PartitionInfo>, StorageError> {
        let suffix = format!(".{PARTITION_EXT}");
        let mut partitions: Vec<PartitionInfo> = self
            .blobs
            .list(prefix)?
            .into_iter()
            .filter(|m| m.key.ends_with(&suffix))
            .map(|m| PartitionInfo {
                key: m.key,
                size_bytes: m.size_bytes,
                last_modified: m.last_modified,
            })
            .collect();
        partitions.sort_by(|a, b| key::compare_keys(&a.key, &b.key));
        Ok(partitions)
    }

    pub fn partition_stats(&self, layer: Layer) -> Result<LayerStats, StorageError> {
        let dead_letter_prefix = key::rejected_prefix(None);
        let (dead, data): (Vec<PartitionInfo>, Vec<PartitionInfo>) = self
            .list_partitions(layer, None, None)?
            .into_iter()
            .partition(|p| p.key.starts_with(&dead_letter_prefix));
        Ok(LayerStats {
            layer,
            partition_count: data.len(),
            total_size_bytes: data.iter().map(|p| p.size_bytes).sum(),
            dead_letter_count: dead.len(),
            dead_letter_size_bytes: dead.iter().map(|p| p.size_bytes).sum(),
        })
    }

    /// Returns false for absent keys and for lookups that fail.
    pub fn key_exists(&self, key: &str) -> bool {
        match self.blobs.head(key) {
            Ok(meta) => meta.is_some(),
            Err(e) => {
                tracing::debug!(key, error = %e, "existence check failed");
                false
            }
        }
    }
}
