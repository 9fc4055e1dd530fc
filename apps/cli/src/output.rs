//! Output formatting utilities

use crate::OutputFormat;
use serde::Serialize;

/// Print output in the specified format
pub fn print_output<T: Serialize + std::fmt::Display>(
    value: &T,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Human => {
            println!("{}", value);
        }
    }
    Ok(())
}

/// Format bytes as human-readable
pub fn format_bytes(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

/// Format a throughput sample (binary megabytes per second)
pub fn format_rate(mbps: f64) -> String {
    format!("{}/s", human_bytes::human_bytes(mbps * 1024.0 * 1024.0))
}
