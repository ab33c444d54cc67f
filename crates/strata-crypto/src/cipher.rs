//! Deterministic reversible field encryption.
//!
//! AES-256-GCM with a synthetic nonce: `nonce = HMAC-SHA256(key, plaintext)[0..12]`.
//! Equal plaintexts under one key produce equal ciphertexts, which is what lets
//! token mappings be written insert-if-absent. Distinct plaintexts get distinct
//! nonces, so the GCM nonce-reuse hazard only arises for identical messages,
//! where it reveals nothing beyond equality.
//!
//! Wire form: `base64url(nonce || ciphertext || tag)`.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

use crate::keys::FieldCipherKey;
use crate::mac::hmac_sha256;
use crate::{CryptoError, Result};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Reversible cipher for the token mapping side-channel.
#[derive(Debug, Clone)]
pub struct FieldCipher {
    key: FieldCipherKey,
}

impl FieldCipher {
    pub fn new(key: FieldCipherKey) -> Self {
        Self { key }
    }

    /// Builds a cipher from an operator secret (see [`FieldCipherKey::from_secret`]).
    pub fn from_secret(secret: &str) -> Result<Self> {
        Ok(Self::new(FieldCipherKey::from_secret(secret)?))
    }

    /// Encrypts `plaintext`, returning the base64url wire form.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = self.synthetic_nonce(plaintext.as_bytes())?;
        let cipher = Aes256Gcm::new_from_slice(self.key.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: b"",
                },
            )
            .map_err(|_| CryptoError::Encrypt)?;

        let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);
        Ok(URL_SAFE.encode(output))
    }

    /// Decrypts a value produced by [`FieldCipher::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let bytes = URL_SAFE.decode(encoded)?;
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Truncated { len: bytes.len() });
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(self.key.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: b"",
                },
            )
            .map_err(|_| CryptoError::Authentication)?;

        Ok(String::from_utf8(plaintext)?)
    }

    fn synthetic_nonce(&self, plaintext: &[u8]) -> Result<[u8; NONCE_LEN]> {
        let digest = hmac_sha256(self.key.as_bytes(), plaintext)?;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        Ok(nonce)
    }
}
