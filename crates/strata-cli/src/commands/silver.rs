//! Silver processing and quality inspection.

use std::path::Path;

use anyhow::Result;

use super::Workspace;
use crate::style::{print_success, print_table, print_warn};

/// Processes every bronze partition without a recorded quality result.
pub fn process(project: &Path, event_type: Option<&str>) -> Result<()> {
    let ws = Workspace::open(project)?;
    let run = ws.pipeline.silver().process_pending(event_type)?;

    let rows: Vec<Vec<String>> = run
        .processed
        .iter()
        .map(|o| {
            vec![
                o.source_partition.clone(),
                o.total.to_string(),
                o.passed.to_string(),
                o.rejected.to_string(),
                o.duplicates_removed.to_string(),
                o.warnings.to_string(),
            ]
        })
        .collect();
    print_table(
        &["Bronze partition", "Total", "Passed", "Rejected", "Duplicates", "Warnings"],
        &rows,
        "No pending bronze partitions.",
    );

    for key in &run.failed {
        print_warn(&format!("{key} failed and stays pending"));
    }
    let stats = ws.pipeline.silver().stats();
    print_success(&format!(
        "Processed {} partition(s): {} passed, {} rejected, {} duplicates removed",
        stats.partitions_processed, stats.total.passed, stats.total.rejected, stats.total.deduplicated
    ));
    Ok(())
}

pub fn quality(project: &Path, event_type: Option<&str>) -> Result<()> {
    let ws = Workspace::open(project)?;
    let rows: Vec<Vec<String>> = ws
        .pipeline
        .silver()
        .quality_results(event_type)?
        .into_iter()
        .map(|q| {
            let rate = if q.total == 0 {
                0.0
            } else {
                q.rejected as f64 / q.total as f64 * 100.0
            };
            vec![
                q.processed_at.to_rfc3339(),
                q.event_type,
                q.total.to_string(),
                q.passed.to_string(),
                q.rejected.to_string(),
                format!("{rate:.1}%"),
                q.partition_path,
            ]
        })
        .collect();
    print_table(
        &["Processed at", "Event type", "Total", "Passed", "Rejected", "Rejection rate", "Bronze partition"],
        &rows,
        "No quality results recorded.",
    );
    Ok(())
}

pub fn rejected(project: &Path, event_type: Option<&str>, limit: usize) -> Result<()> {
    let ws = Workspace::open(project)?;
    let rows: Vec<Vec<String>> = ws
        .pipeline
        .silver()
        .rejected_samples(event_type, limit)?
        .into_iter()
        .map(|s| vec![s.event_id, s.event_type, s.rejection_reasons.join("; ")])
        .collect();
    print_table(&["Event id", "Event type", "Reasons"], &rows, "No rejected events.");
    Ok(())
}
