use strata_io::IoError;
use strata_metadata::MetadataError;
use strata_pii::PiiError;
use strata_quality::InvalidSchema;
use strata_storage::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("blob store unavailable: {0}")]
    Io(#[from] IoError),

    #[error("object store error: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata store error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("tokenization failed: {0}")]
    Pii(#[from] PiiError),

    #[error("schema for {event_type} rejected: {source}")]
    InvalidSchema {
        event_type: String,
        #[source]
        source: InvalidSchema,
    },

    /// Configuration error: the dataset is not defined. Never retried.
    #[error("unknown gold dataset: {dataset}")]
    UnknownDataset { dataset: String },
}

impl PipelineError {
    /// Returns true for failures a caller may retry unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Io(_) => true,
            PipelineError::Storage(e) => e.is_io(),
            PipelineError::Metadata(e) => e.is_transient(),
            _ => false,
        }
    }
}
