//! File system scanning and content hashing for filedex.
//!
//! This crate walks a directory tree, filters the entries and turns each
//! accepted file into a [`FileRecord`]:
//!
//! - **Sorted traversal** via jwalk, so repeated scans visit files in the
//!   same order
//! - **Exclusion globs** matched per path component, with a per-scan cache
//! - **Catalog-aware skipping** of files already indexed with the same size,
//!   mtime and ctime, before any hashing happens
//! - **Parallel MD5 hashing** via rayon, reading in chunks sized from the
//!   available memory
//!
//! # Example
//!
//! ```rust,no_run
//! use filedex_scan::{ScanConfig, ScanFilter, Scanner};
//!
//! let config = ScanConfig::new("/path/to/scan");
//! let mut filter = ScanFilter::from_config(&config).unwrap();
//! let report = Scanner::new().scan(&config, &mut filter).unwrap();
//!
//! println!("{} files on {}", report.snapshot.len(), report.snapshot.system);
//! ```

pub mod filter;
pub mod hasher;
mod progress;
pub mod record;
mod scanner;

pub use filter::{Rejection, ScanFilter};
pub use hasher::hash_file;
pub use progress::ScanProgress;
pub use record::extract;
pub use scanner::{ScanReport, Scanner, platform_descriptor};

// Re-export core types for convenience
pub use filedex_core::{
    FileRecord, FileStat, KnownFiles, ScanConfig, ScanError, ScanWarning, Snapshot, WarningKind,
};
