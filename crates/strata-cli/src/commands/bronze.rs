//! Bronze buffer, checkpoint and object store inspection.

use std::path::Path;

use anyhow::Result;
use strata_types::Layer;

use super::Workspace;
use crate::style::{print_info_table, print_success, print_table};

/// Flushes whatever this process has buffered.
pub fn flush(project: &Path) -> Result<()> {
    let ws = Workspace::open(project)?;
    let written = ws.pipeline.bronze().flush_all()?;
    for partition in &written {
        println!("{} ({} records)", partition.key, partition.record_count);
    }
    print_success(&format!("Flushed {} partition(s)", written.len()));
    Ok(())
}

pub fn checkpoints(project: &Path) -> Result<()> {
    let ws = Workspace::open(project)?;
    let rows: Vec<Vec<String>> = ws
        .pipeline
        .bronze()
        .checkpoints()?
        .into_iter()
        .flat_map(|(topic, partitions)| {
            partitions
                .into_iter()
                .map(move |(partition, offset)| vec![topic.clone(), partition.to_string(), offset.to_string()])
        })
        .collect();
    print_table(&["Topic", "Partition", "Offset"], &rows, "No checkpoints committed.");
    Ok(())
}

/// Per-layer storage totals and per-type bronze partition counts.
pub fn stats(project: &Path) -> Result<()> {
    let ws = Workspace::open(project)?;

    let mut entries = Vec::new();
    for layer in Layer::ALL {
        let stats = ws.store.partition_stats(layer)?;
        entries.push((
            layer.as_str(),
            format!("{} partitions, {} bytes", stats.partition_count, stats.total_size_bytes),
        ));
        if layer == Layer::Silver {
            entries.push((
                "dead-letter",
                format!("{} partitions, {} bytes", stats.dead_letter_count, stats.dead_letter_size_bytes),
            ));
        }
    }
    print_info_table(&entries);

    let mut by_type: std::collections::BTreeMap<String, (usize, usize)> = std::collections::BTreeMap::new();
    for record in ws.pipeline.metadata().partitions(Some(Layer::Bronze), None)? {
        let entry = by_type.entry(record.event_type).or_default();
        entry.0 += 1;
        entry.1 += record.record_count;
    }
    let rows: Vec<Vec<String>> = by_type
        .into_iter()
        .map(|(event_type, (partitions, records))| vec![event_type, partitions.to_string(), records.to_string()])
        .collect();
    print_table(&["Event type", "Partitions", "Records"], &rows, "No bronze partitions recorded.");
    Ok(())
}

pub fn partitions(project: &Path, layer: Layer, event_type: Option<&str>) -> Result<()> {
    let ws = Workspace::open(project)?;
    let rows: Vec<Vec<String>> = ws
        .store
        .list_partitions(layer, event_type, None)?
        .into_iter()
        .map(|p| vec![p.key, p.size_bytes.to_string(), p.last_modified.to_rfc3339()])
        .collect();
    print_table(&["Key", "Size (bytes)", "Last modified"], &rows, "No partitions.");
    Ok(())
}
