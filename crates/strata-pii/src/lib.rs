//! # strata-pii: PII tokenizer
//!
//! Silver and gold data never carry personal values in the clear. A registry
//! names the PII paths per event type ([`registry`]); the [`Tokenizer`] walks
//! an event and replaces those values with tokens of the form
//! `tok_{field}_{24 hex}`. Tokens are a pure function of field, value and
//! secret, so equal identities still join across partitions.
//!
//! The original value is recoverable only through the token mapping
//! side-channel: each new token is paired with the value encrypted under a
//! separate key, persisted in the metadata store and read back by
//! [`Tokenizer::detokenize`].

mod error;
pub mod registry;
mod tokenizer;

pub use error::{PiiError, Result};
pub use registry::{ALL_PII_FIELDS, pii_fields};
pub use tokenizer::{Tokenizer, coerce_text};

#[cfg(test)]
mod tests;
