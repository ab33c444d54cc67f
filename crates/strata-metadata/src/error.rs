//! Error types for metadata operations.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for metadata operations.
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Errors that can occur while reading or writing metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Creating the database directory failed.
    #[error("metadata I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database rejected a statement or could not be opened.
    #[error("metadata database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl MetadataError {
    /// Returns true when the same call may succeed if retried: filesystem
    /// failures and a database held busy or locked by another connection.
    pub fn is_transient(&self) -> bool {
        match self {
            MetadataError::Io { .. } => true,
            MetadataError::Db(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::SystemIoFailure
            ),
            MetadataError::Db(_) => false,
        }
    }
}
