//! Configuration commands.

use anyhow::{Context, Result};
use std::path::Path;
use strata_config::{Paths, StrataConfig};

use crate::style::{print_hint, print_labeled};

/// Show the effective configuration with secrets masked.
pub fn show(project: &Path, format: &str) -> Result<()> {
    let config = StrataConfig::load_from_dir(project).context("Failed to load configuration")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config.redacted())?),
        "toml" => println!("{}", config.to_toml()?),
        _ => {
            println!("Strata Configuration");
            println!("====================\n");

            println!("Storage:");
            print_labeled("Data directory", &config.storage.data_dir.display().to_string());
            print_labeled("Backend", &format!("{:?}", config.storage.backend));
            print_labeled("Compression", &format!("{:?}", config.storage.compression));
            print_labeled("Metadata directory", &config.metadata.dir.display().to_string());
            println!();

            println!("Bronze:");
            print_labeled("Flush batch size", &config.bronze.flush_batch_size.to_string());
            print_labeled("Flush interval (s)", &config.bronze.flush_interval_seconds.to_string());
            println!();

            println!("Silver:");
            print_labeled("Rejection rate threshold", &config.silver.rejection_rate_threshold.to_string());
            print_labeled("Processing interval (s)", &config.silver.processing_interval_seconds.to_string());
            print_labeled("Max future skew (s)", &config.quality.max_future_skew_seconds.to_string());
            println!();

            println!("Gold:");
            print_labeled("Latest partition only", &config.gold.latest_partition_only.to_string());
            println!();

            if config.pii.resolve().development {
                print_hint("PII secrets are unset; development defaults are in use.");
            }
            if !Paths::project_config_file(project).exists() {
                print_hint("No strata.toml found; showing defaults and environment overrides.");
            }
        }
    }

    Ok(())
}

/// Prints a `[pii]` section with new random secrets.
pub fn secrets() {
    println!("[pii]");
    println!("token_secret = \"{}\"", strata_crypto::generate_secret());
    println!("encryption_key = \"{}\"", strata_crypto::generate_secret());
}
