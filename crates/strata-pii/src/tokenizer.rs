//! Event tokenization.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use strata_crypto::{FieldCipher, TokenKey};
use strata_metadata::{MetadataStore, TokenMapping};
use strata_types::Event;

use crate::error::{PiiError, Result};
use crate::registry;

/// A mapping produced by tokenization, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingMapping {
    field: String,
    token: String,
    encrypted: String,
}

/// Replaces registered PII values with deterministic tokens.
///
/// Each value tokenized for the first time by this instance also yields a
/// token mapping (token to encrypted original) that the caller drains with
/// [`Tokenizer::take_mappings`] and persists.
pub struct Tokenizer {
    key: TokenKey,
    cipher: FieldCipher,
    cache: Mutex<HashMap<String, String>>,
    pending: Mutex<Vec<PendingMapping>>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer").finish_non_exhaustive()
    }
}

/// Renders a value the way it is tokenized: strings verbatim, anything else as JSON text.
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Tokenizer {
    pub fn new(key: TokenKey, cipher: FieldCipher) -> Self {
        Self {
            key,
            cipher,
            cache: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn from_secrets(token_secret: &str, encryption_key: &str) -> Result<Self> {
        Ok(Self::new(
            TokenKey::from_secret(token_secret)?,
            FieldCipher::from_secret(encryption_key)?,
        ))
    }

    /// Token for `value` in `field`.
    pub fn tokenize(&self, field: &str, value: &Value) -> Result<String> {
        let text = coerce_text(value);
        let cache_key = format!("{field}:{text}");

        if let Some(token) = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(&cache_key) {
            return Ok(token.clone());
        }

        let token = self.key.tokenize(field, &text)?;
        let encrypted = self.cipher.encrypt(&text)?;

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key, token.clone());
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PendingMapping {
                field: field.to_string(),
                token: token.clone(),
                encrypted,
            });
        Ok(token)
    }

    /// Returns a copy of `event` with every registered PII path tokenized.
    ///
    /// Non-dotted fields are tokenized both at the top level and in the
    /// payload; dotted fields are resolved inside the payload. Null and
    /// missing values are left alone.
    pub fn tokenize_event(&self, event: &Event, event_type: &str) -> Result<Event> {
        let fields = registry::pii_fields(event_type);
        let mut map = event.as_map().clone();

        for field in fields.iter().filter(|f| !f.contains('.')) {
            if let Some(value) = map.get_mut(*field)
                && !value.is_null()
            {
                let token = self.tokenize(field, value)?;
                *value = Value::String(token);
            }
        }

        if let Some(Value::Object(payload)) = map.get_mut("payload") {
            for field in &fields {
                let parts: Vec<&str> = field.split('.').collect();
                self.tokenize_path(payload, &parts, field)?;
            }
        }

        Ok(Event::new(map))
    }

    fn tokenize_path(&self, object: &mut Map<String, Value>, parts: &[&str], field: &str) -> Result<()> {
        match parts {
            [last] => {
                if let Some(value) = object.get_mut(*last)
                    && !value.is_null()
                {
                    let token = self.tokenize(field, value)?;
                    *value = Value::String(token);
                }
            }
            [head, rest @ ..] => {
                if let Some(Value::Object(inner)) = object.get_mut(*head) {
                    self.tokenize_path(inner, rest, field)?;
                }
            }
            [] => {}
        }
        Ok(())
    }

    /// Drains the mappings produced since the last call, stamped with `at`.
    pub fn take_mappings(&self, at: DateTime<Utc>) -> Vec<TokenMapping> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
            .into_iter()
            .map(|m| TokenMapping {
                field: m.field,
                token: m.token,
                encrypted: m.encrypted,
                created_at: at,
            })
            .collect()
    }

    /// Returns mappings to the pending queue after a failed persist.
    pub fn restore_mappings(&self, mappings: Vec<TokenMapping>) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let mut restored: Vec<PendingMapping> = mappings
            .into_iter()
            .map(|m| PendingMapping {
                field: m.field,
                token: m.token,
                encrypted: m.encrypted,
            })
            .collect();
        restored.append(&mut pending);
        *pending = restored;
    }

    pub fn encrypt(&self, value: &str) -> Result<String> {
        Ok(self.cipher.encrypt(value)?)
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String> {
        Ok(self.cipher.decrypt(encrypted)?)
    }

    /// Recovers the original value behind `token`, or `None` if no mapping exists.
    ///
    /// This is the only path from a token back to personal data; callers are
    /// expected to gate it behind their own access control.
    pub fn detokenize(&self, token: &str, store: &dyn MetadataStore) -> Result<Option<String>> {
        let Some(mapping) = store.token_mapping(token)? else {
            return Ok(None);
        };
        tracing::info!(field = %mapping.field, "token detokenized");
        self.cipher
            .decrypt(&mapping.encrypted)
            .map(Some)
            .map_err(|source| PiiError::Undecryptable {
                token: token.to_string(),
                source,
            })
    }
}
