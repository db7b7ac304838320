//! Scan progress reporting.

use std::path::PathBuf;
use std::time::Duration;

/// Snapshot of a running scan, sent while accepted files are hashed.
///
/// Filtering finishes before hashing starts, so `files_to_hash` and both
/// skip counts are final in every update; only the hashing fields advance.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    /// Files accepted by the filter, all of which will be hashed.
    pub files_to_hash: u64,
    /// Files hashed into records so far.
    pub files_recorded: u64,
    /// Bytes of content hashed so far.
    pub bytes_hashed: u64,
    /// Entries turned away by an exclusion pattern.
    pub skipped_excluded: u64,
    /// Files left out because the catalog already holds them.
    pub skipped_known: u64,
    /// Warnings collected so far.
    pub warnings: u64,
    /// Most recently recorded path.
    pub current_path: PathBuf,
    /// Time since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Share of accepted files handled, hashed or failed, in `0.0..=1.0`.
    ///
    /// A scan with nothing left to hash is complete.
    pub fn fraction(&self, handled: u64) -> f64 {
        if self.files_to_hash == 0 {
            1.0
        } else {
            (handled.min(self.files_to_hash)) as f64 / self.files_to_hash as f64
        }
    }

    /// Hashing rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.files_recorded as f64 / secs
        } else {
            0.0
        }
    }

    /// One-line summary for terminal output.
    pub fn summary(&self) -> String {
        format!(
            "{}/{} files hashed, {} already cataloged, {} excluded",
            self.files_recorded, self.files_to_hash, self.skipped_known, self.skipped_excluded
        )
    }
}
