//! Cryptographic error types.

/// Errors from tokenization and field encryption.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Key material was rejected.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption failed")]
    Encrypt,

    /// Ciphertext failed authentication (tampered, truncated, or wrong key).
    #[error("authentication failed: ciphertext tampered or wrong key")]
    Authentication,

    /// Encoded ciphertext is not valid base64.
    #[error("malformed ciphertext encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Ciphertext too short to carry a nonce and tag.
    #[error("ciphertext too short: {len} bytes")]
    Truncated { len: usize },

    /// Decrypted bytes are not UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}
