//! Storage error types.

use strata_io::IoError;

/// Errors from the columnar object store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Blob store failure (transient or permanent).
    #[error(transparent)]
    Io(#[from] IoError),

    /// Parquet encode or decode failure.
    #[error("parquet error: {0}")]
    Parquet(String),

    /// Stored partition cannot be interpreted.
    #[error("corrupt partition {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// A row value does not fit the declared column type.
    #[error("column '{column}' expects {expected}, row {row} has {found}")]
    ColumnType {
        column: String,
        expected: &'static str,
        row: usize,
        found: String,
    },
}

impl StorageError {
    pub(crate) fn parquet(reason: impl Into<String>) -> Self {
        Self::Parquet(reason.into())
    }

    /// Returns true if the failure came from the blob store rather than the data.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
