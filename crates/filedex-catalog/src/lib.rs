//! SQLite catalog of file observations for filedex.
//!
//! A catalog stores one row per observed file, deduplicated on every column
//! except the row id. It answers the questions the scanner and the CLI ask:
//!
//! - **Was this file indexed already?** cheaply by size and times, or exactly
//!   by content digest
//! - **Which contents are stored more than once?** grouped by digest
//! - **What is in another catalog that is missing here?** via merging
//!
//! ```rust,no_run
//! use filedex_catalog::Catalog;
//! use filedex_scan::{ScanConfig, ScanFilter, Scanner};
//!
//! let mut catalog = Catalog::open("data.sqlite").unwrap();
//! let config = ScanConfig::new("/path/to/scan");
//! let report = {
//!     let mut filter = ScanFilter::from_config(&config).unwrap().with_known(&catalog);
//!     Scanner::new().scan(&config, &mut filter).unwrap()
//! };
//! if !report.snapshot.is_empty() {
//!     catalog.ingest(&report.snapshot.files).unwrap();
//! }
//! for group in catalog.duplicate_groups().unwrap() {
//!     println!("{} x{}", group.md5, group.count);
//! }
//! ```

mod catalog;
mod error;
mod merge;
mod row;
pub mod schema;

pub use catalog::{Catalog, DEFAULT_CATALOG_PATH};
pub use error::{CatalogError, Result};
pub use row::{CatalogRow, DedupKey, DuplicateGroup};

// Re-export core types for convenience
pub use filedex_core::{FastKey, FileRecord, RecordQuery};
