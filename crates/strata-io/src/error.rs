//! I/O error types.

use std::path::PathBuf;

/// Errors from a blob store backend.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Underlying OS I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Object not found.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Object already exists; objects are write-once.
    #[error("object already exists: {key}")]
    AlreadyExists { key: String },

    /// Key is empty, absolute, or escapes the store root.
    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Root directory could not be prepared.
    #[error("blob store root unusable at {path}: {source}")]
    Root {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failure injected by a test backend.
    #[error("injected failure: {0}")]
    Injected(&'static str),
}
