//! # strata-storage: Columnar object store
//!
//! Writes and reads immutable Parquet partitions addressed by a
//! layer-partitioned key scheme:
//!
//! ```text
//! ┌────────────┐   Table    ┌─────────────┐   Bytes   ┌────────────┐
//! │  pipeline  │ ─────────► │ ObjectStore │ ────────► │ BlobStore  │
//! │   stages   │ ◄───────── │  (Parquet)  │ ◄──────── │ (fs / mem) │
//! └────────────┘            └─────────────┘           └────────────┘
//! ```
//!
//! - [`key`]: partition key scheme and partition ordering
//! - [`codec`]: Parquet encoding of row tables
//! - [`layout`]: bronze, silver and dead-letter column layouts
//! - [`ObjectStore`]: write, read, list and stat partitions

pub mod codec;
mod error;
pub mod key;
pub mod layout;
mod store;


pub use codec::{Column, ColumnType, Compression, Row, Table};
pub use error::StorageError;
pub use key::{KeyStamp, partition_key, rejected_key};
pub use store::{LayerStats, ObjectStore, PartitionInfo, WrittenPartition};

pub type Result<T> = std::result::Result<T, StorageError>;
