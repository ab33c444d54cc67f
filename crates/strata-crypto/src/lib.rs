//! # strata-crypto: Cryptographic primitives for `Strata`
//!
//! Two independent primitives protect identifying values in the lake:
//!
//! - [`TokenKey`]: keyed one-way tokenization (HMAC-SHA256). The same
//!   `(field, value)` always yields the same token, so tokenized identities
//!   still join.
//! - [`FieldCipher`]: deterministic, reversible AES-256-GCM encryption with a
//!   synthetic nonce. Used only for the token mapping side-channel.
//!
//! Keys are derived from operator-supplied secrets with HKDF-SHA256 and are
//! zeroed from memory when dropped.

mod cipher;
mod error;
mod keys;
mod mac;
mod token;

pub use cipher::FieldCipher;
pub use error::CryptoError;
pub use keys::{FieldCipherKey, derive_key, generate_secret};
pub use token::{TOKEN_DIGEST_HEX_LEN, TokenKey};

/// Result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
