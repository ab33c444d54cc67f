//! Table formatting using comfy-table.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use serde_json::{Map, Value};

fn styled() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a table with a bold header row.
pub fn result_table<S: AsRef<str>>(columns: &[S], rows: &[Vec<String>]) -> Table {
    let mut table = styled();
    table.set_header(
        columns
            .iter()
            .map(|c| Cell::new(c.as_ref()).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    for row in rows {
        table.add_row(row);
    }
    table
}

/// Prints a table followed by a row count, or `empty` when there are no rows.
pub fn print_table<S: AsRef<str>>(columns: &[S], rows: &[Vec<String>], empty: &str) {
    if rows.is_empty() {
        println!("{empty}");
        return;
    }
    println!("{}", result_table(columns, rows));
    let count = rows.len();
    let row_word = if count == 1 { "row" } else { "rows" };
    println!("({count} {row_word})");
}

/// Prints a key-value info table.
pub fn print_info_table(entries: &[(&str, String)]) {
    let mut table = styled();
    for (key, value) in entries {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    println!("{table}");
}

/// Renders a JSON value for a table cell.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Prints JSON objects as a table whose columns are the union of their keys,
/// in order of first appearance.
pub fn print_rows(rows: &[Map<String, Value>]) {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| row.get(*c).map(cell_text).unwrap_or_default()).collect())
        .collect();
    print_table(&columns, &body, "No rows.");
}
