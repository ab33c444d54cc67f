//! CLI command implementations.

pub mod bronze;
pub mod config;
pub mod gold;
pub mod ingest;
pub mod schema;
pub mod silver;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use strata_config::{CompressionSetting, ConfigLoader, StorageBackend, StrataConfig};
use strata_io::{BlobStore, FsBlobStore, MemoryBlobStore};
use strata_metadata::{MetadataStore, SqliteMetadataStore};
use strata_pii::Tokenizer;
use strata_pipeline::{BronzeConfig, Pipeline, PipelineConfig, SilverConfig};
use strata_quality::GateConfig;
use strata_storage::{Compression, ObjectStore};
use strata_types::SystemClock;

/// Everything a command needs, opened from one project directory.
pub struct Workspace {
    pub config: StrataConfig,
    pub store: ObjectStore,
    pub pipeline: Pipeline,
}

impl Workspace {
    pub fn open(project: &Path) -> Result<Self> {
        let config = ConfigLoader::new()
            .with_project_dir(project)
            .load()
            .context("Failed to load configuration")?;

        let (blobs, metadata): (Arc<dyn BlobStore>, Arc<dyn MetadataStore>) = match config.storage.backend {
            StorageBackend::Fs => {
                let blobs = FsBlobStore::open(config.storage.data_dir.clone()).with_context(|| {
                    format!("Failed to open object store at {}", config.storage.data_dir.display())
                })?;
                let metadata = SqliteMetadataStore::open_in_dir(&config.metadata.dir).with_context(|| {
                    format!("Failed to open metadata store at {}", config.metadata.dir.display())
                })?;
                (Arc::new(blobs), Arc::new(metadata))
            }
            StorageBackend::Memory => (
                Arc::new(MemoryBlobStore::new()),
                Arc::new(SqliteMetadataStore::in_memory().context("Failed to open in-memory metadata store")?),
            ),
        };
        let store = ObjectStore::new(blobs).with_compression(compression(config.storage.compression));

        let secrets = config.pii.resolve();
        let tokenizer = Tokenizer::from_secrets(&secrets.token_secret, &secrets.encryption_key)
            .context("Failed to initialise PII tokenizer")?;

        let pipeline = Pipeline::new(
            pipeline_config(&config),
            Arc::new(SystemClock),
            store.clone(),
            metadata,
            tokenizer,
        );
        tracing::debug!(
            data_dir = %config.storage.data_dir.display(),
            metadata_dir = %config.metadata.dir.display(),
            "workspace opened"
        );

        Ok(Self { config, store, pipeline })
    }
}

fn compression(setting: CompressionSetting) -> Compression {
    match setting {
        CompressionSetting::Snappy => Compression::Snappy,
        CompressionSetting::Zstd => Compression::Zstd,
        CompressionSetting::None => Compression::None,
    }
}

fn seconds(secs: u64) -> Duration {
    Duration::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX)).unwrap_or(Duration::MAX)
}

pub fn pipeline_config(config: &StrataConfig) -> PipelineConfig {
    PipelineConfig {
        bronze: BronzeConfig {
            flush_batch_size: config.bronze.flush_batch_size,
            flush_interval: seconds(config.bronze.flush_interval_seconds),
        },
        silver: SilverConfig {
            rejection_rate_threshold: config.silver.rejection_rate_threshold,
        },
        gate: GateConfig {
            max_future_skew: seconds(config.quality.max_future_skew_seconds),
            ..GateConfig::default()
        },
    }
}

/// Parses a range bound. A bare date covers the whole day: it starts the
/// range at midnight and ends it at the last second.
pub fn parse_bound(text: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(t) = time {
            return Ok(t.and_utc());
        }
    }
    strata_types::parse_timestamp(text).with_context(|| format!("Invalid date or timestamp '{text}'"))
}

/// Looks up the plaintext behind a token.
pub fn detokenize(project: &Path, token: &str) -> Result<()> {
    let ws = Workspace::open(project)?;
    let metadata = ws.pipeline.metadata();
    match ws
        .pipeline
        .silver()
        .tokenizer()
        .detokenize(token, metadata.as_ref())
        .context("Failed to detokenize")?
    {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => anyhow::bail!("No mapping for token '{token}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_dates_cover_the_whole_day() {
        let start = parse_bound("2026-03-01", false).unwrap();
        let end = parse_bound("2026-03-01", true).unwrap();
        assert_eq!(start.to_rfc3339(), "2026-03-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-03-01T23:59:59+00:00");
        assert!(parse_bound("yesterday", false).is_err());
    }

    #[test]
    fn config_sections_map_onto_stages() {
        let mut config = StrataConfig::default();
        config.bronze.flush_interval_seconds = 5;
        config.quality.max_future_skew_seconds = u64::MAX;

        let pipeline = pipeline_config(&config);
        assert_eq!(pipeline.bronze.flush_interval, Duration::seconds(5));
        assert_eq!(pipeline.gate.max_future_skew, Duration::MAX);

        let gate = strata_quality::QualityGate::new(pipeline.gate, Arc::new(SystemClock));
        let event = strata_types::Event::from_value(serde_json::json!({
            "event_id": "s-1",
            "event_type": "login",
            "timestamp": "2999-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(gate.check(&event, None).accepted());
    }
}
