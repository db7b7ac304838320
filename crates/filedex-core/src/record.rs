//! File observation records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::format::{format_size, format_timestamp};

/// Raw stat fields captured for a file.
///
/// Only the size and the three nanosecond timestamps take part in catalog
/// deduplication. Any other `st_*` fields a platform provides are kept in
/// `extra` so snapshots round-trip them unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStat {
    /// Size in bytes.
    pub st_size: u64,
    /// Last access time, nanoseconds since the epoch.
    pub st_atime_ns: i64,
    /// Last modification time, nanoseconds since the epoch.
    pub st_mtime_ns: i64,
    /// Last status change time, nanoseconds since the epoch.
    pub st_ctime_ns: i64,
    /// Other raw stat fields (`st_mode`, `st_ino`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FileStat {
    /// Create a stat block with no extra fields.
    pub fn new(st_size: u64, st_atime_ns: i64, st_mtime_ns: i64, st_ctime_ns: i64) -> Self {
        Self {
            st_size,
            st_atime_ns,
            st_mtime_ns,
            st_ctime_ns,
            extra: BTreeMap::new(),
        }
    }

    /// Minimum of the three timestamps, in seconds.
    pub fn earliest_timestamp(&self) -> f64 {
        ns_to_secs(self.st_atime_ns.min(self.st_mtime_ns).min(self.st_ctime_ns))
    }

    /// Key used for the cheap "already indexed" check.
    pub fn fast_key(&self) -> FastKey {
        FastKey {
            st_size: self.st_size,
            st_mtime_ns: self.st_mtime_ns,
            st_ctime_ns: self.st_ctime_ns,
        }
    }
}

/// Size plus modify and status-change times.
///
/// Two observations with equal keys are assumed to be the same file without
/// hashing. Files copied with preserved timestamps can collide; that
/// under-counts duplicates and is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FastKey {
    pub st_size: u64,
    pub st_mtime_ns: i64,
    pub st_ctime_ns: i64,
}

/// One observation of a file at scan time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Lowercase hex MD5 of the file content.
    #[serde(rename = "md5")]
    pub digest: String,
    /// Absolute path at observation time.
    pub path: String,
    /// Earliest of access/modify/status-change time, in seconds.
    pub earliest_timestamp: f64,
    /// Raw stat fields.
    pub stat: FileStat,
}

impl FileRecord {
    /// Build a record, deriving `earliest_timestamp` from the stat block.
    pub fn new(digest: impl Into<String>, path: impl Into<String>, stat: FileStat) -> Self {
        Self {
            digest: digest.into(),
            path: path.into(),
            earliest_timestamp: stat.earliest_timestamp(),
            stat,
        }
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.stat.st_size
    }

    /// Human readable description of the record.
    pub fn describe(&self) -> String {
        [
            "File:".to_string(),
            format!("Hash: {}", self.digest),
            format!("Location: {}", self.path),
            format!("Time: {}", format_timestamp(self.earliest_timestamp)),
            format!("Size: {}", format_size(self.stat.st_size)),
        ]
        .join("\n")
    }
}

/// Float seconds built as whole seconds plus scaled nanoseconds.
///
/// Dividing the full nanosecond count instead rounds twice and can land one
/// ulp away, which breaks exact `ctime` matches against existing catalogs.
fn ns_to_secs(ns: i64) -> f64 {
    let secs = ns.div_euclid(1_000_000_000);
    let nanos = ns.rem_euclid(1_000_000_000);
    secs as f64 + nanos as f64 * 1e-9
}
