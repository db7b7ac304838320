//! Core types and traits for filedex.
//!
//! This crate provides the data structures shared by the scanner and the
//! catalog: file records, scan snapshots, query filters, configuration and
//! the error types used across the workspace.

mod config;
mod error;
pub mod format;
mod known;
mod query;
mod record;
mod snapshot;

pub use config::{DEFAULT_EXCLUDES, ScanConfig, ScanConfigBuilder};
pub use error::{LookupError, ScanError, ScanWarning, WarningKind};
pub use known::KnownFiles;
pub use query::RecordQuery;
pub use record::{FastKey, FileRecord, FileStat};
pub use snapshot::Snapshot;
