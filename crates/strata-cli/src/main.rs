//! Strata command line.
//!
//! Operator surface over the bronze, silver and gold stages of the event lake.
//!
//! # Quick Start
//!
//! ```bash
//! # Replay captured events into bronze
//! strata ingest events.jsonl --partition 0
//!
//! # Validate, deduplicate and tokenize into silver
//! strata silver process
//!
//! # Materialize and read a gold dataset
//! strata gold refresh daily-transaction-summary
//! strata gold query daily-transaction-summary --from 2026-03-01
//! ```

mod commands;
mod style;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use strata_types::Layer;
use tracing_subscriber::EnvFilter;

/// Strata - event lake pipeline from raw bus messages to analytics datasets.
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding strata.toml and the default data directories.
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines file of events into bronze.
    Ingest {
        /// File with one event object per line.
        file: PathBuf,

        /// Source topic. Defaults to the topic mapped from each event type.
        #[arg(short, long)]
        topic: Option<String>,

        /// Source partition.
        #[arg(short, long, default_value = "0")]
        partition: i32,
    },

    /// Flush buffered bronze events.
    Flush,

    /// Show committed consumer offsets.
    Checkpoints,

    /// Bronze layer inspection.
    #[command(subcommand)]
    Bronze(BronzeCommands),

    /// Schema registry.
    #[command(subcommand)]
    Schema(SchemaCommands),

    /// Silver processing.
    #[command(subcommand)]
    Silver(SilverCommands),

    /// Gold datasets.
    #[command(subcommand)]
    Gold(GoldCommands),

    /// Reveal the value behind a PII token.
    Detokenize {
        token: String,
    },

    /// Configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum BronzeCommands {
    /// Storage totals per layer and bronze partitions per event type.
    Stats,

    /// List stored partitions in order.
    Partitions {
        /// Layer to list (bronze, silver, gold).
        #[arg(short, long, default_value = "bronze")]
        layer: Layer,

        #[arg(short, long)]
        event_type: Option<String>,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Register a schema definition from a JSON file.
    Register {
        event_type: String,
        #[arg(id = "schema_version", value_name = "VERSION")]
        version: String,
        file: PathBuf,
    },

    /// List registered schemas, newest first.
    List {
        #[arg(short, long)]
        event_type: Option<String>,
    },
}

#[derive(Subcommand)]
enum SilverCommands {
    /// Process every unprocessed bronze partition.
    Process {
        #[arg(short, long)]
        event_type: Option<String>,
    },

    /// Show recent quality results.
    Quality {
        #[arg(short, long)]
        event_type: Option<String>,
    },

    /// Show rejected events from the dead-letter area.
    Rejected {
        #[arg(short, long)]
        event_type: Option<String>,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum GoldCommands {
    /// Rebuild a dataset from silver.
    Refresh {
        /// Dataset name.
        dataset: Option<String>,

        /// Refresh every dataset.
        #[arg(long, conflicts_with = "dataset")]
        all: bool,

        /// Earliest event timestamp or date to include.
        #[arg(long)]
        from: Option<String>,

        /// Latest event timestamp or date to include.
        #[arg(long)]
        to: Option<String>,
    },

    /// Read dataset rows.
    Query {
        dataset: String,

        /// Equality filter, `column=value`. Repeatable.
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Earliest `date` to include.
        #[arg(long)]
        from: Option<String>,

        /// Latest `date` to include.
        #[arg(long)]
        to: Option<String>,

        /// Read only the newest partition.
        #[arg(long)]
        latest: bool,

        /// Print one JSON object per row.
        #[arg(long)]
        json: bool,
    },

    /// List datasets and their freshness.
    Datasets,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Output format (text, toml, json).
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print freshly generated PII secrets in strata.toml form.
    Secrets,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let project = cli.project.as_path();
    match cli.command {
        Commands::Ingest { file, topic, partition } => {
            commands::ingest::run(project, &file, topic.as_deref(), partition)
        }
        Commands::Flush => commands::bronze::flush(project),
        Commands::Checkpoints => commands::bronze::checkpoints(project),
        Commands::Bronze(cmd) => match cmd {
            BronzeCommands::Stats => commands::bronze::stats(project),
            BronzeCommands::Partitions { layer, event_type } => {
                commands::bronze::partitions(project, layer, event_type.as_deref())
            }
        },
        Commands::Schema(cmd) => match cmd {
            SchemaCommands::Register {
                event_type,
                version,
                file,
            } => commands::schema::register(project, &event_type, &version, &file),
            SchemaCommands::List { event_type } => commands::schema::list(project, event_type.as_deref()),
        },
        Commands::Silver(cmd) => match cmd {
            SilverCommands::Process { event_type } => commands::silver::process(project, event_type.as_deref()),
            SilverCommands::Quality { event_type } => commands::silver::quality(project, event_type.as_deref()),
            SilverCommands::Rejected { event_type, limit } => {
                commands::silver::rejected(project, event_type.as_deref(), limit)
            }
        },
        Commands::Gold(cmd) => match cmd {
            GoldCommands::Refresh { dataset, all, from, to } => {
                commands::gold::refresh(project, dataset.as_deref(), all, from.as_deref(), to.as_deref())
            }
            GoldCommands::Query {
                dataset,
                filters,
                from,
                to,
                latest,
                json,
            } => commands::gold::query(
                project,
                &commands::gold::QueryArgs {
                    dataset: &dataset,
                    filters: &filters,
                    from: from.as_deref(),
                    to: to.as_deref(),
                    latest,
                    json,
                },
            ),
            GoldCommands::Datasets => commands::gold::datasets(project),
        },
        Commands::Detokenize { token } => commands::detokenize(project, &token),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(project, &format),
            ConfigCommands::Secrets => {
                commands::config::secrets();
                Ok(())
            }
        },
    }
}
