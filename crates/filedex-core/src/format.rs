//! Display helpers for sizes and timestamps.

use chrono::{DateTime, Local};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count, e.g. `1536` -> `"1.50 KB"`.
///
/// The value is divided by 1024 while it stays above 1024, so `1024` itself
/// is still reported in the smaller unit.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut index = 0;
    while size > 1024.0 && index < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        index += 1;
    }
    format!("{size:.2} {}", SIZE_UNITS[index])
}

/// Format seconds since the epoch as local `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(timestamp: f64) -> String {
    let secs = timestamp.floor() as i64;
    let nanos = ((timestamp - timestamp.floor()) * 1e9) as u32;
    match DateTime::from_timestamp(secs, nanos) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => format!("{timestamp}"),
    }
}
