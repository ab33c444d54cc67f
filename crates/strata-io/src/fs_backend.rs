//! Filesystem blob store using `std::fs`.
//!
//! Each key maps to a file under the root directory. Writes go to a hidden
//! temporary file in the destination directory, are fsynced, then renamed into
//! place, so readers never observe a partial object under its final key.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::IoError;
use crate::backend::{BlobStore, ObjectMeta, validate_key};

/// Blob store rooted at a local directory.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    /// Counter for generating unique temporary file names.
    next_tmp_id: AtomicU64,
}

impl FsBlobStore {
    /// Opens (creating if needed) a blob store at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, IoError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| IoError::Root {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            next_tmp_id: AtomicU64::new(1),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, IoError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }

    fn meta_for(key: String, path: &Path) -> Result<ObjectMeta, IoError> {
        let md = fs::metadata(path)?;
        let last_modified = md
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(ObjectMeta {
            key,
            size_bytes: md.len(),
            last_modified,
        })
    }

    /// Recursively collects files under `dir`, skipping hidden temp files.
    fn walk(&self, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<(), IoError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type()?.is_dir() {
                self.walk(&path, out)?;
            } else if let Ok(rel) = path.strip_prefix(&self.root) {
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push((key, path));
            }
        }
        Ok(())
    }
}

fn write_then_rename(tmp: &Path, dest: &Path, data: &[u8]) -> Result<(), IoError> {
    let mut file = File::create(tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(tmp, dest)?;
    Ok(())
}

impl BlobStore for FsBlobStore {
    fn put(&self, key: &str, data: Bytes) -> Result<(), IoError> {
        let path = self.path_for(key)?;
        if path.exists() {
            return Err(IoError::AlreadyExists {
                key: key.to_string(),
            });
        }
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let tmp_id = self.next_tmp_id.fetch_add(1, Ordering::Relaxed);
        let tmp = dir.join(format!(".put-{}-{tmp_id}.tmp", std::process::id()));
        let result = write_then_rename(&tmp, &path, &data);
        match &result {
            Ok(()) => tracing::debug!(key, size_bytes = data.len(), "object stored"),
            Err(e) => {
                tracing::warn!(key, error = %e, "object write failed");
                let _ = fs::remove_file(&tmp);
            }
        }
        result
    }

    fn get(&self, key: &str) -> Result<Bytes, IoError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(IoError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn head(&self, key: &str) -> Result<Option<ObjectMeta>, IoError> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Ok(None);
        }
        Self::meta_for(key.to_string(), &path).map(Some)
    }

    fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, IoError> {
        // Start from the deepest directory the prefix names.
        let dir_part = prefix.rsplit_once('/').map_or("", |(dir, _)| dir);
        let start = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.path_for(dir_part)?
        };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        self.walk(&start, &mut files)?;

        let mut out = Vec::new();
        for (key, path) in files {
            if key.starts_with(prefix) {
                out.push(Self::meta_for(key, &path)?);
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }
}
