//! Gold refresh, query and catalog commands.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use strata_pipeline::gold::DATASETS;
use strata_pipeline::{GoldQuery, RefreshOutcome, RefreshStatus};

use super::{Workspace, parse_bound};
use crate::style::{print_rows, print_success, print_table};

const OPEN_START: &str = "0000-01-01";
const OPEN_END: &str = "9999-12-31";

fn range(from: Option<&str>, to: Option<&str>) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    match (from, to) {
        (None, None) => Ok(None),
        (from, to) => {
            let start = from.map_or(Ok(DateTime::<Utc>::MIN_UTC), |f| parse_bound(f, false))?;
            let end = to.map_or(Ok(DateTime::<Utc>::MAX_UTC), |t| parse_bound(t, true))?;
            Ok(Some((start, end)))
        }
    }
}

/// Splits `column=value`; the value is read as JSON when it parses, else as text.
pub fn parse_filter(text: &str) -> Result<(String, Value)> {
    let (column, raw) = text
        .split_once('=')
        .with_context(|| format!("Filter '{text}' must look like column=value"))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((column.trim().to_string(), value))
}

fn status_text(status: RefreshStatus) -> &'static str {
    match status {
        RefreshStatus::Refreshed => "refreshed",
        RefreshStatus::NoData => "no data",
        RefreshStatus::NoResults => "no results",
    }
}

pub fn refresh(project: &Path, dataset: Option<&str>, all: bool, from: Option<&str>, to: Option<&str>) -> Result<()> {
    let range = range(from, to)?;
    if dataset.is_some() == all {
        anyhow::bail!("Pass a dataset name or --all");
    }

    let ws = Workspace::open(project)?;
    let gold = ws.pipeline.gold();
    let outcomes: Vec<RefreshOutcome> = match dataset {
        Some(name) => vec![gold.refresh(name, range)?],
        None if range.is_none() => gold.refresh_all()?,
        None => DATASETS
            .iter()
            .map(|d| gold.refresh(d.name, range))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let rows: Vec<Vec<String>> = outcomes
        .iter()
        .map(|o| {
            vec![
                o.dataset.clone(),
                status_text(o.status).to_string(),
                o.records.to_string(),
                o.key.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["Dataset", "Status", "Records", "Partition"], &rows, "Nothing refreshed.");
    let refreshed = outcomes.iter().filter(|o| o.status == RefreshStatus::Refreshed).count();
    print_success(&format!("{refreshed} dataset(s) refreshed"));
    Ok(())
}

pub struct QueryArgs<'a> {
    pub dataset: &'a str,
    pub filters: &'a [String],
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
    pub latest: bool,
    pub json: bool,
}

pub fn query(project: &Path, args: &QueryArgs<'_>) -> Result<()> {
    let filters = args.filters.iter().map(|f| parse_filter(f)).collect::<Result<Vec<_>>>()?;
    let date_range = match (args.from, args.to) {
        (None, None) => None,
        (from, to) => Some((
            from.unwrap_or(OPEN_START).to_string(),
            to.unwrap_or(OPEN_END).to_string(),
        )),
    };

    let ws = Workspace::open(project)?;
    let query = GoldQuery {
        filters,
        date_range,
        latest_partition_only: args.latest || ws.config.gold.latest_partition_only,
    };
    let rows = ws.pipeline.gold().query(args.dataset, &query)?;

    if args.json {
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
    } else {
        print_rows(&rows);
    }
    Ok(())
}

/// Lists dataset definitions with their last refresh.
pub fn datasets(project: &Path) -> Result<()> {
    let ws = Workspace::open(project)?;
    let rows: Vec<Vec<String>> = ws
        .pipeline
        .gold()
        .datasets()?
        .into_iter()
        .map(|d| {
            vec![
                d.dataset,
                d.grain,
                d.refresh_schedule,
                d.last_refreshed_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string()),
                d.record_count.to_string(),
                d.freshness_seconds.map(|s| s.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    print_table(
        &["Dataset", "Grain", "Schedule", "Last refreshed", "Records", "Freshness (s)"],
        &rows,
        "No datasets defined.",
    );
    Ok(())
}
