//! Layered configuration loading

use crate::{Paths, StrataConfig};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `STRATA_BRONZE__FLUSH_BATCH_SIZE`.
pub const ENV_PREFIX: &str = "STRATA";

/// Loads configuration from defaults, files and the environment.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_vars: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            project_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_vars: None,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Reads environment overrides from `vars` instead of the process environment.
    pub fn with_env_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Load configuration with full precedence hierarchy
    pub fn load(self) -> Result<StrataConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = StrataConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config, 3. project config, 4. local overrides
        let user_config = Paths::new().user_config_file().ok();
        let files = user_config.into_iter().chain([
            Paths::project_config_file(&self.project_dir),
            Paths::local_config_file(&self.project_dir),
        ]);
        for path in files.filter(|p| p.exists()) {
            tracing::debug!(path = %path.display(), "loading config file");
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(self.env_vars),
        );

        let mut config: StrataConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.resolve_paths(&self.project_dir);
        config.validate()?;

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompressionSetting, StorageBackend};
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_vars(HashMap::new())
    }

    #[test]
    fn defaults_without_files() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config.bronze.flush_batch_size, 1000);
        assert_eq!(config.bronze.flush_interval_seconds, 60);
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.storage.compression, CompressionSetting::Snappy);
        assert!(!config.gold.latest_partition_only);
    }

    #[test]
    fn project_config_overrides_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("strata.toml"),
            "[bronze]\nflush_batch_size = 250\n\n[storage]\ncompression = \"zstd\"\n",
        )
        .expect("Failed to write config");

        let config = loader(temp_dir.path()).load().expect("Failed to load config");
        assert_eq!(config.bronze.flush_batch_size, 250);
        assert_eq!(config.bronze.flush_interval_seconds, 60);
        assert_eq!(config.storage.compression, CompressionSetting::Zstd);
    }

    #[test]
    fn local_config_overrides_project() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("strata.toml"),
            "[silver]\nrejection_rate_threshold = 0.2\n",
        )
        .expect("Failed to write config");
        fs::write(
            temp_dir.path().join("strata.local.toml"),
            "[silver]\nrejection_rate_threshold = 0.05\n",
        )
        .expect("Failed to write config");

        let config = loader(temp_dir.path()).load().expect("Failed to load config");
        assert!((config.silver.rejection_rate_threshold - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn environment_overrides_files() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("strata.toml"), "[bronze]\nflush_batch_size = 250\n")
            .expect("Failed to write config");

        let vars = HashMap::from([
            ("STRATA_BRONZE__FLUSH_BATCH_SIZE".to_string(), "500".to_string()),
            ("STRATA_GOLD__LATEST_PARTITION_ONLY".to_string(), "true".to_string()),
        ]);
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .with_env_vars(vars)
            .load()
            .expect("Failed to load config");

        assert_eq!(config.bronze.flush_batch_size, 500);
        assert!(config.gold.latest_partition_only);
    }

    #[test]
    fn invalid_values_fail_to_load() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("strata.toml"), "[bronze]\nflush_batch_size = 0\n")
            .expect("Failed to write config");

        assert!(loader(temp_dir.path()).load().is_err());
    }

    #[test]
    fn relative_paths_resolve_against_project() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");

        assert_eq!(config.storage.data_dir, temp_dir.path().join(".strata/lake"));
        assert_eq!(config.metadata.dir, temp_dir.path().join(".strata/meta"));
    }
}
