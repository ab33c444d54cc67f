//! Replays a JSON-lines file through the bronze buffer.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use strata_pipeline::topic_for_event_type;
use strata_types::Event;

use super::Workspace;
use crate::style::{print_info_table, print_success, print_warn};

/// Counters reported after a replay.
#[derive(Debug, Default)]
struct Summary {
    ingested: u64,
    already_committed: u64,
    malformed: u64,
    unroutable: u64,
}

/// Each line is one message; its offset is the line number unless the object
/// carries an integer `_offset`. Lines at or below the committed checkpoint are
/// skipped, so replaying a file resumes where the last run stopped.
pub fn run(project: &Path, file: &Path, topic: Option<&str>, partition: i32) -> Result<()> {
    let ws = Workspace::open(project)?;
    let reader = BufReader::new(File::open(file).with_context(|| format!("Failed to open {}", file.display()))?);

    let mut summary = Summary::default();
    let mut resume: HashMap<String, i64> = HashMap::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", file.display()))?;
        if line.trim().is_empty() {
            continue;
        }

        let Some(mut event) = serde_json::from_str::<Value>(&line).ok().and_then(Event::from_value) else {
            tracing::warn!(line = line_no + 1, "skipping line that is not a JSON object");
            summary.malformed += 1;
            continue;
        };

        let offset = event
            .as_map_mut()
            .remove("_offset")
            .and_then(|v| v.as_i64())
            .unwrap_or(line_no as i64);

        let event_type = event.event_type();
        let Some(topic) = topic.or_else(|| topic_for_event_type(event_type.as_str())) else {
            tracing::warn!(line = line_no + 1, event_type = %event_type, "no topic for event type");
            summary.unroutable += 1;
            continue;
        };

        let next = match resume.get(topic) {
            Some(next) => *next,
            None => {
                let next = ws.pipeline.resume_offset(topic, partition)?;
                resume.insert(topic.to_string(), next);
                next
            }
        };
        if offset < next {
            summary.already_committed += 1;
            continue;
        }

        if let Some(key) = ws.pipeline.ingest(event, topic, partition, offset) {
            tracing::debug!(key = %key, "flushed during ingest");
        }
        summary.ingested += 1;
    }

    let written = ws.pipeline.shutdown().context("Failed to flush buffered events")?;

    print_info_table(&[
        ("Ingested", summary.ingested.to_string()),
        ("Already committed", summary.already_committed.to_string()),
        ("Malformed", summary.malformed.to_string()),
        ("Unroutable", summary.unroutable.to_string()),
        ("Bronze partitions written", ws.pipeline.bronze().stats().partitions_created.to_string()),
    ]);
    if summary.malformed + summary.unroutable > 0 {
        print_warn("Some lines were skipped; rerun with --verbose for details.");
    }
    print_success(&format!("Flushed {} partition(s) at exit", written.len()));
    Ok(())
}
