//! JWalk-based directory scanner producing file records.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use jwalk::{Parallelism, WalkDir};
use rayon::prelude::*;
use sysinfo::System;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use filedex_core::{FileRecord, ScanConfig, ScanError, ScanWarning, Snapshot, WarningKind};

use crate::filter::{Rejection, ScanFilter};
use crate::progress::ScanProgress;
use crate::record::extract;

/// Outcome of a scan: the snapshot plus everything that was left out.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Host, root and records in walk order.
    pub snapshot: Snapshot,
    /// Entries rejected by the exclusion patterns.
    pub skipped_excluded: u64,
    /// Entries rejected because the catalog already knows them.
    pub skipped_known: u64,
    /// Per-entry problems that were recovered from.
    pub warnings: Vec<ScanWarning>,
    /// Wall time of the scan.
    pub duration: Duration,
}

/// Walks a directory tree and turns accepted entries into records.
pub struct Scanner {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl Scanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan `config.root`, keeping the entries `filter` accepts.
    ///
    /// Records name files below the root as given, made absolute but with
    /// symlinks left in place, the same way [`extract`] names them.
    ///
    /// Only an unusable root fails the scan, including one whose listing
    /// cannot be read. Entries and subdirectories that vanish or cannot be
    /// read are reported as warnings and left out.
    pub fn scan(
        &self,
        config: &ScanConfig,
        filter: &mut ScanFilter<'_>,
    ) -> Result<ScanReport, ScanError> {
        let start = Instant::now();
        let root = std::path::absolute(&config.root).map_err(|e| ScanError::io(&config.root, e))?;
        // Walk the resolved directory, report paths under `root`.
        let walk_root = root.canonicalize().map_err(|e| ScanError::io(&root, e))?;

        if !walk_root.is_dir() {
            return Err(ScanError::NotADirectory { path: root });
        }
        fs::read_dir(&walk_root).map_err(|e| ScanError::io(&root, e))?;

        let mut warnings = Vec::new();
        let walked = self.collect_candidates(config, &root, &walk_root, filter, &mut warnings)?;
        warnings.extend(filter.take_warnings());

        let mut progress = ScanProgress {
            files_to_hash: walked.candidates.len() as u64,
            skipped_excluded: walked.skipped_excluded,
            skipped_known: walked.skipped_known,
            ..ScanProgress::default()
        };

        let hashed = hash_candidates(config, walked.candidates)?;

        let mut files: Vec<FileRecord> = Vec::with_capacity(hashed.len());

        for (path, result) in hashed {
            match result {
                Ok(record) => {
                    progress.files_recorded += 1;
                    progress.bytes_hashed += record.size();
                    files.push(record);

                    if progress.files_recorded % config.progress_interval.max(1) == 0 {
                        progress.current_path = path;
                        progress.warnings = warnings.len() as u64;
                        progress.elapsed = start.elapsed();
                        let _ = self.progress_tx.send(progress.clone());
                    }
                }
                Err(e) if e.is_recoverable() => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    warnings.push(ScanWarning::from_error(&path, &e));
                }
                Err(e) => return Err(e),
            }
        }

        let duration = start.elapsed();
        progress.warnings = warnings.len() as u64;
        progress.elapsed = duration;
        let _ = self.progress_tx.send(progress);

        info!(
            root = %root.display(),
            files = files.len(),
            skipped_known = walked.skipped_known,
            skipped_excluded = walked.skipped_excluded,
            warnings = warnings.len(),
            elapsed_ms = duration.as_millis() as u64,
            "Scan finished"
        );

        Ok(ScanReport {
            snapshot: Snapshot::new(platform_descriptor(), root.to_string_lossy(), files),
            skipped_excluded: walked.skipped_excluded,
            skipped_known: walked.skipped_known,
            warnings,
            duration,
        })
    }

    /// Walk the tree and run every entry through the filter.
    ///
    /// Candidates are returned under `root` even though `walk_root`, its
    /// resolved form, is what gets walked.
    fn collect_candidates(
        &self,
        config: &ScanConfig,
        root: &Path,
        walk_root: &Path,
        filter: &mut ScanFilter<'_>,
        warnings: &mut Vec<ScanWarning>,
    ) -> Result<Walked, ScanError> {
        let parallelism = match config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };

        // Sorted so the visitation order is reproducible.
        let walker = WalkDir::new(walk_root)
            .parallelism(parallelism)
            .sort(true)
            .skip_hidden(false)
            .follow_links(config.follow_symlinks);

        let mut walked = Walked::default();

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!(path = %path.display(), error = %err, "Walk error");
                    warnings.push(ScanWarning::new(path, err.to_string(), WarningKind::ReadError));
                    continue;
                }
            };

            let walked_path = entry.path();
            let relative = walked_path.strip_prefix(walk_root).unwrap_or(&walked_path);
            let path = root.join(relative);

            // A directory whose listing failed is yielded with the error attached.
            if let Some(err) = &entry.read_children_error {
                let error = ScanError::io(&path, listing_error(err));
                if entry.depth == 0 {
                    return Err(error);
                }
                warn!(path = %path.display(), error = %error, "Cannot list directory");
                warnings.push(ScanWarning::from_error(&path, &error));
            }

            match filter.check(walk_root, &walked_path, entry.file_type()) {
                Ok(()) => walked.candidates.push(path),
                Err(Rejection::NotAFile) => {}
                Err(Rejection::Excluded) => {
                    debug!(path = %path.display(), "Excluded");
                    walked.skipped_excluded += 1;
                }
                Err(Rejection::AlreadyKnown) => {
                    debug!(path = %path.display(), "Already in catalog");
                    walked.skipped_known += 1;
                }
            }
        }

        Ok(walked)
    }
}

/// The I/O error behind a failed directory listing.
fn listing_error(err: &jwalk::Error) -> std::io::Error {
    let kind = err
        .io_error()
        .map_or(std::io::ErrorKind::Other, std::io::Error::kind);
    std::io::Error::new(kind, err.to_string())
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Host platform descriptor, e.g. `Linux-6.8.0-x86_64`.
pub fn platform_descriptor() -> String {
    let name = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
    [
        name,
        System::kernel_version().unwrap_or_default(),
        std::env::consts::ARCH.to_string(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join("-")
}

/// Entries accepted by the filter, plus rejection counts.
#[derive(Default)]
struct Walked {
    candidates: Vec<PathBuf>,
    skipped_excluded: u64,
    skipped_known: u64,
}

type Extracted = Vec<(PathBuf, Result<FileRecord, ScanError>)>;

/// Hash accepted entries in parallel, keeping walk order.
fn hash_candidates(config: &ScanConfig, candidates: Vec<PathBuf>) -> Result<Extracted, ScanError> {
    let run = move || -> Extracted {
        candidates
            .into_par_iter()
            .map(|path| {
                let record = extract(&path);
                (path, record)
            })
            .collect()
    };

    match config.threads {
        0 => Ok(run()),
        n => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| ScanError::InvalidConfig {
                    message: format!("cannot start {n} hashing threads: {e}"),
                })?;
            Ok(pool.install(run))
        }
    }
}
