//! Small CLI helpers

use console::style;
use std::path::PathBuf;

/// Default directory for airlift keys
#[must_use]
pub fn default_key_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".airlift"))
        .unwrap_or_else(|| PathBuf::from(".airlift"))
}

/// Print a list of advisory warnings
pub fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        println!("{} {warning}", style("warning:").yellow().bold());
    }
}

/// Shorten a hash for display
#[must_use]
pub fn truncate_hash(hash: &str, len: usize) -> &str {
    &hash[..hash.len().min(len)]
}
