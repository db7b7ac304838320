//! Entry filtering during a scan.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::FileType;
use std::path::{Component, Path};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};

use filedex_core::{DEFAULT_EXCLUDES, KnownFiles, ScanConfig, ScanError, ScanWarning, WarningKind};

use crate::record::stat_path;

/// Why an entry was left out of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Directory, special file or symlink not pointing at a regular file.
    NotAFile,
    /// A path component matched an exclusion pattern.
    Excluded,
    /// The catalog already holds an observation with the same size and times.
    AlreadyKnown,
}

/// Decides which walked entries become records.
///
/// Holds per-scan state: components that already passed the exclusion globs
/// are remembered so shared parent directories are matched once. A component
/// is only remembered after it passed, so the cache never admits an excluded
/// entry. One filter belongs to one scan at a time.
pub struct ScanFilter<'a> {
    excludes: GlobSet,
    permitted: HashSet<OsString>,
    known: Option<&'a dyn KnownFiles>,
    warnings: Vec<ScanWarning>,
}

impl<'a> ScanFilter<'a> {
    /// Filter using the default exclusion patterns.
    pub fn new() -> Self {
        // The defaults are static and known to compile.
        Self::with_patterns(DEFAULT_EXCLUDES.iter().copied())
            .unwrap_or_else(|_| Self::from_set(GlobSet::empty()))
    }

    /// Filter using the default patterns plus the config's extra ones.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        Self::with_patterns(config.exclude_patterns())
    }

    /// Filter using exactly the given patterns.
    pub fn with_patterns<'p>(patterns: impl IntoIterator<Item = &'p str>) -> Result<Self, ScanError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidConfig {
                message: format!("bad exclusion pattern {pattern:?}: {e}"),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })?;
        Ok(Self::from_set(set))
    }

    fn from_set(excludes: GlobSet) -> Self {
        Self {
            excludes,
            permitted: HashSet::new(),
            known: None,
            warnings: Vec::new(),
        }
    }

    /// Skip files a catalog already knows by size, mtime and ctime.
    pub fn with_known(mut self, known: &'a dyn KnownFiles) -> Self {
        self.known = Some(known);
        self
    }

    /// Whether `path`, reached below `root`, should be scanned.
    pub fn accept(&mut self, root: &Path, path: &Path, file_type: FileType) -> bool {
        match self.check(root, path, file_type) {
            Ok(()) => true,
            Err(reason) => {
                debug!(path = %path.display(), ?reason, "Skipping entry");
                false
            }
        }
    }

    /// Like [`accept`](Self::accept) but reports the reason for a rejection.
    pub fn check(&mut self, root: &Path, path: &Path, file_type: FileType) -> Result<(), Rejection> {
        if !is_regular_file(path, file_type) {
            return Err(Rejection::NotAFile);
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if self.is_excluded(relative) {
            return Err(Rejection::Excluded);
        }

        let Some(known) = self.known else {
            return Ok(());
        };
        // A stat failure here is left to the extractor, which reports it.
        if let Ok(stat) = stat_path(path) {
            match known.exists_fast(&stat.fast_key()) {
                Ok(true) => return Err(Rejection::AlreadyKnown),
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Catalog lookup failed, keeping entry");
                    self.warnings
                        .push(ScanWarning::new(path, e.to_string(), WarningKind::LookupError));
                }
            }
        }

        Ok(())
    }

    /// Whether any normal component of `relative` matches an exclusion.
    pub fn is_excluded(&mut self, relative: &Path) -> bool {
        for component in relative.components() {
            let Component::Normal(part) = component else {
                continue;
            };
            if self.permitted.contains(part) {
                continue;
            }
            if self.excludes.is_match(Path::new(part)) {
                return true;
            }
            self.permitted.insert(part.to_os_string());
        }
        false
    }

    /// Number of components proven not excluded so far.
    pub fn cached_components(&self) -> usize {
        self.permitted.len()
    }

    /// Take the warnings collected while filtering.
    pub fn take_warnings(&mut self) -> Vec<ScanWarning> {
        std::mem::take(&mut self.warnings)
    }
}

impl Default for ScanFilter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_regular_file(path: &Path, file_type: FileType) -> bool {
    if file_type.is_file() {
        return true;
    }
    // Symlinks count when they resolve to a regular file.
    file_type.is_symlink() && std::fs::metadata(path).is_ok_and(|m| m.is_file())
}
