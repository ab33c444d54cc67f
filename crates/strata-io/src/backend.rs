//! Blob store trait.
//!
//! The [`BlobStore`] trait abstracts the object storage that partition files
//! live in. Keys are `/`-separated relative paths such as
//! `bronze/transaction-initiated/2026/03/01/12/events_1772366400_batch1a2b3c4d.parquet`.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::IoError;

/// Listing entry for a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}

/// Abstraction over flat key/bytes object storage.
///
/// All methods are synchronous and block on I/O. Retries belong to the caller.
pub trait BlobStore: Send + Sync {
    /// Stores `data` under `key`. Fails if the key already exists.
    fn put(&self, key: &str, data: Bytes) -> Result<(), IoError>;

    /// Reads the full object.
    fn get(&self, key: &str) -> Result<Bytes, IoError>;

    /// Returns object metadata, or `None` if absent.
    fn head(&self, key: &str) -> Result<Option<ObjectMeta>, IoError>;

    /// Lists objects whose key starts with `prefix`, in key order.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, IoError>;
}

/// Rejects keys that are empty, absolute, contain empty or dot segments, or
/// use backslashes.
pub fn validate_key(key: &str) -> Result<(), IoError> {
    let invalid = |reason| IoError::InvalidKey {
        key: key.to_string(),
        reason,
    };
    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if key.starts_with('/') {
        return Err(invalid("absolute key"));
    }
    if key.contains('\\') {
        return Err(invalid("backslash in key"));
    }
    for segment in key.split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative path segment")),
            _ => {}
        }
    }
    Ok(())
}
