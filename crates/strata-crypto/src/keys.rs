//! Key derivation.
//!
//! Operator secrets are arbitrary strings. Encryption keys are derived from
//! them with HKDF-SHA256 so that a short or low-entropy secret never becomes a
//! raw AES key, and so that distinct purposes get independent keys.

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{CryptoError, Result};

const FIELD_CIPHER_SALT: &[u8] = b"strata-pii-field-cipher";
const FIELD_CIPHER_INFO: &[u8] = b"field-cipher-v1";

/// RFC 5869 HKDF Extract+Expand to a 32-byte key.
pub fn derive_key(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(okm)
}

/// Generates a random 32-byte secret, hex encoded, suitable for configuration.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    bytes.zeroize();
    hex
}

/// AES-256 key for [`crate::FieldCipher`].
///
/// Key material is securely zeroed from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FieldCipherKey {
    key: [u8; 32],
}

impl FieldCipherKey {
    /// Derives the field cipher key from an operator secret.
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(CryptoError::InvalidKey("encryption secret is empty".into()));
        }
        let key = derive_key(secret.as_bytes(), FIELD_CIPHER_SALT, FIELD_CIPHER_INFO)?;
        Ok(Self { key })
    }

    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self> {
        if bytes == [0u8; 32] {
            return Err(CryptoError::InvalidKey("key is all zeros".into()));
        }
        Ok(Self { key: bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for FieldCipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldCipherKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic_and_separated() {
        let a = derive_key(b"secret", b"salt", b"one").unwrap();
        let b = derive_key(b"secret", b"salt", b"one").unwrap();
        let c = derive_key(b"secret", b"salt", b"two").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_secret_rejected() {
        assert!(FieldCipherKey::from_secret("").is_err());
        assert!(FieldCipherKey::from_bytes([0u8; 32]).is_err());
    }

    #[test]
    fn generated_secrets_differ() {
        let a = generate_secret();
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_secret());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = FieldCipherKey::from_secret("hunter2").unwrap();
        assert_eq!(format!("{key:?}"), "FieldCipherKey(<redacted>)");
    }
}
