//! Schema registry commands.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use super::Workspace;
use crate::style::{print_success, print_table, print_warn};

pub fn register(project: &Path, event_type: &str, version: &str, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let definition: Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", file.display()))?;

    let ws = Workspace::open(project)?;
    if ws.pipeline.bronze().register_schema(event_type, version, definition)? {
        print_success(&format!("Registered {event_type} v{version}"));
    } else {
        print_warn(&format!("{event_type} v{version} is already registered; left unchanged"));
    }
    Ok(())
}

pub fn list(project: &Path, event_type: Option<&str>) -> Result<()> {
    let ws = Workspace::open(project)?;
    let rows: Vec<Vec<String>> = ws
        .pipeline
        .bronze()
        .schemas(event_type)?
        .into_iter()
        .map(|s| vec![s.event_type, s.version, s.registered_at.to_rfc3339()])
        .collect();
    print_table(&["Event type", "Version", "Registered at"], &rows, "No schemas registered.");
    Ok(())
}
