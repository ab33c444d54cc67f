//! Configuration management for Strata
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (STRATA_* prefix, `__` between section and key)
//! 2. strata.local.toml (gitignored, local overrides)
//! 3. strata.toml (git-tracked, project config)
//! 4. ~/.config/strata/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::{ConfigLoader, ENV_PREFIX};
pub use paths::{Paths, STATE_DIR};

/// Environment variable consulted when `pii.token_secret` is empty.
pub const TOKEN_SECRET_ENV: &str = "PII_TOKEN_SECRET";
/// Environment variable consulted when `pii.encryption_key` is empty.
pub const ENCRYPTION_KEY_ENV: &str = "PII_ENCRYPTION_KEY";

const DEV_TOKEN_SECRET: &str = "strata-pii-token-secret-dev-only";
const DEV_ENCRYPTION_KEY: &str = "strata-encryption-key-dev-only";

/// Main Strata configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub bronze: BronzeSettings,
    pub silver: SilverSettings,
    pub quality: QualitySettings,
    pub pii: PiiSettings,
    pub gold: GoldSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Object store root.
    pub data_dir: PathBuf,
    pub backend: StorageBackend,
    pub compression: CompressionSetting,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: Path::new(STATE_DIR).join("lake"),
            backend: StorageBackend::Fs,
            compression: CompressionSetting::Snappy,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    Fs,
    /// Nothing survives the process; useful for dry runs.
    Memory,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionSetting {
    Snappy,
    Zstd,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub dir: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            dir: Path::new(STATE_DIR).join("meta"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BronzeSettings {
    pub flush_batch_size: usize,
    pub flush_interval_seconds: u64,
}

impl Default for BronzeSettings {
    fn default() -> Self {
        Self {
            flush_batch_size: 1000,
            flush_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SilverSettings {
    pub rejection_rate_threshold: f64,
    pub processing_interval_seconds: u64,
}

impl Default for SilverSettings {
    fn default() -> Self {
        Self {
            rejection_rate_threshold: 0.10,
            processing_interval_seconds: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    pub max_future_skew_seconds: u64,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            max_future_skew_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PiiSettings {
    pub token_secret: String,
    pub encryption_key: String,
}

/// Secrets the tokenizer is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiiSecrets {
    pub token_secret: String,
    pub encryption_key: String,
    /// True when at least one secret fell back to the development default.
    pub development: bool,
}

impl PiiSettings {
    /// Resolves secrets from config, then the process environment, then
    /// development defaults.
    pub fn resolve(&self) -> PiiSecrets {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> PiiSecrets {
        let pick = |configured: &str, env: &str| -> Option<String> {
            if !configured.is_empty() {
                return Some(configured.to_string());
            }
            lookup(env).filter(|v| !v.is_empty())
        };
        let token_secret = pick(&self.token_secret, TOKEN_SECRET_ENV);
        let encryption_key = pick(&self.encryption_key, ENCRYPTION_KEY_ENV);
        let development = token_secret.is_none() || encryption_key.is_none();
        if development {
            tracing::warn!("PII secrets not configured; using development defaults");
        }
        PiiSecrets {
            token_secret: token_secret.unwrap_or_else(|| DEV_TOKEN_SECRET.to_string()),
            encryption_key: encryption_key.unwrap_or_else(|| DEV_ENCRYPTION_KEY.to_string()),
            development,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldSettings {
    pub latest_partition_only: bool,
}

impl StrataConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.storage.data_dir.is_relative() {
            self.storage.data_dir = base.join(&self.storage.data_dir);
        }

        if self.metadata.dir.is_relative() {
            self.metadata.dir = base.join(&self.metadata.dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bronze.flush_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "bronze.flush_batch_size must be at least 1".to_string(),
            ));
        }
        let threshold = self.silver.rejection_rate_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::ValidationError(format!(
                "silver.rejection_rate_threshold must lie in [0, 1], got {threshold}"
            )));
        }
        Ok(())
    }

    /// Copy safe to print: configured secrets are masked.
    pub fn redacted(&self) -> Self {
        let mask = |s: &str| if s.is_empty() { String::new() } else { "********".to_string() };
        let mut copy = self.clone();
        copy.pii.token_secret = mask(&self.pii.token_secret);
        copy.pii.encryption_key = mask(&self.pii.encryption_key);
        copy
    }

    /// Pretty TOML rendering of [`StrataConfig::redacted`].
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(&self.redacted())?)
    }
}
