//! In-memory blob store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::IoError;
use crate::backend::{BlobStore, ObjectMeta, validate_key};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

/// Blob store held entirely in memory.
///
/// `set_fail_writes(true)` makes every subsequent `put` fail, for exercising
/// retry and flush-failure paths.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, key: &str, data: Bytes) -> Result<(), IoError> {
        validate_key(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(IoError::Injected("write refused"));
        }
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        if objects.contains_key(key) {
            return Err(IoError::AlreadyExists {
                key: key.to_string(),
            });
        }
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Bytes, IoError> {
        validate_key(key)?;
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| IoError::NotFound {
                key: key.to_string(),
            })
    }

    fn head(&self, key: &str) -> Result<Option<ObjectMeta>, IoError> {
        validate_key(key)?;
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|o| ObjectMeta {
                key: key.to_string(),
                size_bytes: o.data.len() as u64,
                last_modified: o.last_modified,
            }))
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, IoError> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, o)| ObjectMeta {
                key: k.clone(),
                size_bytes: o.data.len() as u64,
                last_modified: o.last_modified,
            })
            .collect())
    }
}
