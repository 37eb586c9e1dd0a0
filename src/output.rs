//! User-facing terminal messages
//!
//! Summaries and problems meant for the person running the tool go here,
//! separate from `log` output (which carries timestamps and module paths).
//! Everything is written to stderr so stdout stays clean for JSON.

use owo_colors::OwoColorize;

/// Print a warning in yellow, padded by blank lines
pub fn warn(message: &str) {
    eprintln!("\n{}\n", message.yellow());
}

/// Print an error in red, padded by blank lines
///
/// ```ignore
/// output::error("URL store not found: urls.db. Run 'vulnurl mine' first.");
/// ```
pub fn error(message: &str) {
    eprintln!("\n{}\n", message.red());
}

/// Print a run summary in green
pub fn info(message: &str) {
    eprintln!("\n{}\n", message.green());
}
