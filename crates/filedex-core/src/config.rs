//! Scan configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Path components matching any of these globs are never scanned:
/// hidden entries, dunder-wrapped names such as `__pycache__`, executables.
pub const DEFAULT_EXCLUDES: &[&str] = &[".*", "__*__", "*.exe"];

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Descend into symlinked directories.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Number of hashing threads (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Exclusion globs applied on top of [`DEFAULT_EXCLUDES`].
    #[builder(default)]
    #[serde(default)]
    pub extra_excludes: Vec<String>,

    /// Emit a progress update every this many hashed files.
    #[builder(default = "1000")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_progress_interval() -> u64 {
    1000
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        if let Some(ref patterns) = self.extra_excludes {
            if let Some(empty) = patterns.iter().position(|p| p.is_empty()) {
                return Err(format!("Exclusion pattern #{empty} is empty"));
            }
        }
        if self.progress_interval == Some(0) {
            return Err("Progress interval must be positive".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
            threads: 0,
            extra_excludes: Vec::new(),
            progress_interval: default_progress_interval(),
        }
    }

    /// Default and extra exclusion patterns, in that order.
    pub fn exclude_patterns(&self) -> impl Iterator<Item = &str> {
        DEFAULT_EXCLUDES
            .iter()
            .copied()
            .chain(self.extra_excludes.iter().map(String::as_str))
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
