use strata_crypto::CryptoError;
use strata_metadata::MetadataError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PiiError>;

#[derive(Debug, Error)]
pub enum PiiError {
    #[error("pii crypto failure: {0}")]
    Crypto(#[from] CryptoError),

    #[error("token mapping lookup failed: {0}")]
    Metadata(#[from] MetadataError),

    /// A stored mapping does not decrypt under the configured key.
    #[error("token {token} could not be decrypted: {source}")]
    Undecryptable {
        token: String,
        #[source]
        source: CryptoError,
    },
}
