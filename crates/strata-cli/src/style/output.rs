//! Output helper functions for consistent messages.

pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

pub fn print_warn(msg: &str) {
    println!("⚠ {msg}");
}

pub fn print_hint(msg: &str) {
    println!("→ {msg}");
}

/// Prints a labeled key-value pair with indentation.
pub fn print_labeled(key: &str, value: &str) {
    println!("  {key}: {value}");
}
