//! filedex - An incremental content-hash catalog of your files.
//!
//! Usage:
//!   filedex scan [-d DIR]          Hash new files and write a snapshot
//!   filedex submit <SNAPSHOT>...   Add snapshots to the catalog
//!   filedex merge <DB>...          Pull rows from other catalogs
//!   filedex duplicates             List contents stored more than once
//!   filedex info <FILE>            Show whether a file is cataloged
//!   filedex --help                 Show help

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use filedex_catalog::{Catalog, DEFAULT_CATALOG_PATH, RecordQuery};
use filedex_core::format::{format_size, format_timestamp};
use filedex_scan::{ScanConfig, ScanFilter, Scanner, Snapshot, extract};
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(
    name = "filedex",
    version,
    about = "An incremental content-hash catalog of your files",
    long_about = "filedex scans directory trees, hashes every new file and keeps the \
                  results in a SQLite catalog.\n\n\
                  Files already in the catalog with the same size, mtime and ctime are \
                  skipped without hashing, so repeated scans only pay for what changed."
)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory and record every new file
    Scan {
        /// Directory to scan
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Catalog used to skip files that are already indexed
        #[arg(short, long, default_value = DEFAULT_CATALOG_PATH)]
        catalog: PathBuf,

        /// Add the scanned files to the catalog right away
        #[arg(short, long)]
        submit: bool,

        /// Do not write a snapshot file into the scanned directory
        #[arg(long)]
        no_save: bool,

        /// Additional exclusion glob, matched per path component
        #[arg(short, long = "exclude", value_name = "PATTERN")]
        excludes: Vec<String>,

        /// Number of hashing threads (0 = one per core)
        #[arg(short = 'j', long, default_value = "0")]
        threads: usize,
    },

    /// Create an empty catalog
    Init {
        /// Catalog file to create
        #[arg(short, long, default_value = DEFAULT_CATALOG_PATH)]
        catalog: PathBuf,
    },

    /// Add snapshot files to the catalog
    Submit {
        /// Snapshot files written by `filedex scan`
        #[arg(required = true)]
        snapshots: Vec<PathBuf>,

        /// Catalog to add to
        #[arg(short, long, default_value = DEFAULT_CATALOG_PATH)]
        catalog: PathBuf,

        /// Delete each snapshot after it was added, without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Copy rows missing from the catalog out of other catalogs
    Merge {
        /// Catalogs to read from
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Catalog to merge into
        #[arg(short, long, default_value = DEFAULT_CATALOG_PATH)]
        catalog: PathBuf,
    },

    /// List contents stored more than once
    Duplicates {
        /// Catalog to inspect
        #[arg(short, long, default_value = DEFAULT_CATALOG_PATH)]
        catalog: PathBuf,

        /// Maximum number of duplicate groups to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show catalog rows matching every given field
    Select {
        /// Catalog to query
        #[arg(short, long, default_value = DEFAULT_CATALOG_PATH)]
        catalog: PathBuf,

        #[arg(long)]
        id: Option<i64>,

        #[arg(long)]
        md5: Option<String>,

        #[arg(long)]
        path: Option<String>,

        /// Size in bytes
        #[arg(long)]
        size: Option<u64>,

        #[arg(long)]
        mtime_ns: Option<i64>,

        #[arg(long)]
        ctime_ns: Option<i64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Remove catalog rows by id
    Delete {
        /// Row ids as shown by `select` or `duplicates`
        #[arg(required = true)]
        ids: Vec<i64>,

        /// Catalog to delete from
        #[arg(short, long, default_value = DEFAULT_CATALOG_PATH)]
        catalog: PathBuf,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Describe a file and report whether the catalog knows it
    Info {
        /// File to inspect
        file: PathBuf,

        /// Catalog to check against
        #[arg(short, long, default_value = DEFAULT_CATALOG_PATH)]
        catalog: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Scan {
            directory,
            catalog,
            submit,
            no_save,
            excludes,
            threads,
        } => {
            run_scan(&directory, &catalog, submit, !no_save, excludes, threads)?;
        }
        Command::Init { catalog } => {
            run_init(&catalog)?;
        }
        Command::Submit {
            snapshots,
            catalog,
            yes,
        } => {
            run_submit(&snapshots, &catalog, yes)?;
        }
        Command::Merge { sources, catalog } => {
            run_merge(&sources, &catalog)?;
        }
        Command::Duplicates {
            catalog,
            top,
            format,
        } => {
            run_duplicates(&catalog, top, format)?;
        }
        Command::Select {
            catalog,
            id,
            md5,
            path,
            size,
            mtime_ns,
            ctime_ns,
            format,
        } => {
            let query = RecordQuery {
                id,
                md5,
                path,
                st_size: size,
                st_mtime_ns: mtime_ns,
                st_ctime_ns: ctime_ns,
                ..RecordQuery::default()
            };
            run_select(&catalog, &query, format)?;
        }
        Command::Delete { ids, catalog, yes } => {
            run_delete(&ids, &catalog, yes)?;
        }
        Command::Info { file, catalog } => {
            run_info(&file, &catalog)?;
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` or the verbosity flag.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Open an existing catalog, refusing to create one as a side effect.
fn open_existing(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        bail!(
            "No catalog at {} (create one with `filedex init`)",
            path.display()
        );
    }
    Catalog::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))
}

/// Scan a directory, write its snapshot and optionally catalog it.
fn run_scan(
    directory: &Path,
    catalog_path: &Path,
    submit: bool,
    save: bool,
    excludes: Vec<String>,
    threads: usize,
) -> Result<()> {
    let config = ScanConfig::builder()
        .root(directory)
        .extra_excludes(excludes)
        .threads(threads)
        .build()
        .wrap_err("Invalid scan options")?;

    let mut catalog = if submit || catalog_path.exists() {
        Some(Catalog::open(catalog_path).wrap_err("Failed to open catalog")?)
    } else {
        None
    };

    eprintln!("Scanning {}...", directory.display());

    let report = {
        let mut filter = ScanFilter::from_config(&config)?;
        if let Some(catalog) = catalog.as_ref() {
            filter = filter.with_known(catalog);
        }

        let scanner = Scanner::new();
        let mut progress_rx = scanner.subscribe();
        let reporter = thread::spawn(move || {
            loop {
                match progress_rx.blocking_recv() {
                    Ok(progress) => eprintln!(
                        "  [{:>3.0}%] {}, {} ({:.0} files/s)",
                        progress.fraction(progress.files_recorded) * 100.0,
                        progress.summary(),
                        format_size(progress.bytes_hashed),
                        progress.files_per_second()
                    ),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let result = scanner.scan(&config, &mut filter);
        // Closing the channel stops the reporter.
        drop(scanner);
        let _ = reporter.join();
        result.wrap_err("Scan failed")?
    };

    for warning in &report.warnings {
        warn!(path = %warning.path.display(), "{}", warning.message);
    }

    let total: u64 = report.snapshot.files.iter().map(|r| r.size()).sum();
    println!();
    println!("{}", "─".repeat(60));
    println!(" {} on {}", report.snapshot.scan_directory, report.snapshot.system);
    println!(
        " {} new files, {}",
        report.snapshot.len(),
        format_size(total)
    );
    println!(
        " {} excluded, {} already cataloged",
        report.skipped_excluded, report.skipped_known
    );
    println!(" Scanned in {:.2}s", report.duration.as_secs_f64());
    println!("{}", "─".repeat(60));

    if report.snapshot.is_empty() {
        println!(" Nothing new.");
        return Ok(());
    }

    if save {
        let written = report
            .snapshot
            .save_to_dir(&report.snapshot.scan_directory)
            .wrap_err("Failed to write snapshot")?;
        println!(" Snapshot: {}", written.display());
    }

    if let Some(catalog) = catalog.as_mut() {
        if submit {
            let added = catalog.ingest(&report.snapshot.files)?;
            println!(" Added {} rows (now: {})", added, catalog.count()?);
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("{} warning(s) during scan", report.warnings.len());
    }

    Ok(())
}

/// Create an empty catalog.
fn run_init(catalog_path: &Path) -> Result<()> {
    if Catalog::validate(catalog_path)? {
        println!("{} is already a catalog", catalog_path.display());
        return Ok(());
    }
    let catalog = Catalog::open(catalog_path)
        .wrap_err_with(|| format!("Cannot initialize {}", catalog_path.display()))?;
    println!("Created {}", catalog.path().unwrap_or(catalog_path).display());
    Ok(())
}

/// Load snapshots and add their records.
fn run_submit(snapshots: &[PathBuf], catalog_path: &Path, yes: bool) -> Result<()> {
    let mut catalog = Catalog::open(catalog_path).wrap_err("Failed to open catalog")?;

    for path in snapshots {
        let snapshot = Snapshot::load(path)?;
        if snapshot.is_empty() {
            warn!(snapshot = %path.display(), "Snapshot holds no files, skipped");
            continue;
        }

        let added = catalog
            .ingest(&snapshot.files)
            .wrap_err_with(|| format!("Failed to submit {}", path.display()))?;
        println!(
            "{}: {} of {} records added",
            path.display(),
            added,
            snapshot.len()
        );

        if yes || confirm(&format!("Delete {}?", path.display()))? {
            std::fs::remove_file(path)
                .wrap_err_with(|| format!("Failed to delete {}", path.display()))?;
            info!(snapshot = %path.display(), "Snapshot removed");
        }
    }

    println!("Catalog now holds {} rows", catalog.count()?);
    Ok(())
}

/// Merge other catalogs into this one.
///
/// A source that fails is reported and the remaining sources still merge.
fn run_merge(sources: &[PathBuf], catalog_path: &Path) -> Result<()> {
    let mut catalog = Catalog::open(catalog_path).wrap_err("Failed to open catalog")?;

    let mut total = 0;
    let mut failed = 0;
    for source in sources {
        match catalog.merge_from(source) {
            Ok(added) => {
                println!("{}: {} rows added", source.display(), added);
                total += added;
            }
            Err(e) => {
                warn!(source = %source.display(), error = %e, "Merge failed");
                println!("{}: failed ({})", source.display(), e);
                failed += 1;
            }
        }
    }

    println!("Merged {} rows (now: {})", total, catalog.count()?);
    if failed > 0 {
        bail!("{failed} of {} sources could not be merged", sources.len());
    }
    Ok(())
}

/// List duplicate groups with their rows.
fn run_duplicates(catalog_path: &Path, top_n: usize, format: OutputFormat) -> Result<()> {
    let catalog = open_existing(catalog_path)?;
    let groups = catalog.duplicate_groups()?;

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Duplicate File Report");
            println!("{}", "─".repeat(70));
            println!();

            if groups.is_empty() {
                println!(" No duplicate files found.");
                return Ok(());
            }

            let copies: u64 = groups.iter().map(|g| g.count).sum();
            println!(
                " Found {} duplicate groups ({} rows)",
                groups.len(),
                copies
            );
            println!();

            for (i, group) in groups.iter().take(top_n).enumerate() {
                let rows = catalog.duplicate_rows(&group.md5)?;
                let size = rows.first().map_or(0, |r| r.key.st_size.max(0) as u64);
                println!(
                    " Group {} ({} rows, {} each) {}",
                    i + 1,
                    group.count,
                    format_size(size),
                    group.md5
                );
                for row in &rows {
                    println!(
                        "   [{}] {}  {}",
                        row.id,
                        format_timestamp(row.key.ctime),
                        row.key.path
                    );
                }
                println!();
            }

            let remaining = groups.len().saturating_sub(top_n);
            if remaining > 0 {
                println!(" ... and {} more", remaining);
            }
        }
        OutputFormat::Json => {
            let mut out = Vec::new();
            for group in groups.iter().take(top_n) {
                out.push(json!({
                    "md5": group.md5,
                    "count": group.count,
                    "rows": catalog.duplicate_rows(&group.md5)?,
                }));
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}

/// Print rows matching a query.
fn run_select(catalog_path: &Path, query: &RecordQuery, format: OutputFormat) -> Result<()> {
    if query.is_empty() {
        bail!("Give at least one field to select on");
    }
    let catalog = open_existing(catalog_path)?;
    let rows = catalog.select(query)?;

    match format {
        OutputFormat::Text => {
            for row in &rows {
                println!(
                    "[{}] {}  {:>10}  {}  {}",
                    row.id,
                    row.key.md5,
                    format_size(row.key.st_size.max(0) as u64),
                    format_timestamp(row.key.ctime),
                    row.key.path
                );
            }
            eprintln!("{} row(s)", rows.len());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }

    Ok(())
}

/// Delete rows by id after confirmation.
fn run_delete(ids: &[i64], catalog_path: &Path, yes: bool) -> Result<()> {
    let mut catalog = open_existing(catalog_path)?;

    if !yes && !confirm(&format!("Delete {} row(s) from {}?", ids.len(), catalog_path.display()))? {
        println!("Nothing deleted.");
        return Ok(());
    }

    let removed = catalog.delete(ids)?;
    println!("Deleted {} row(s) (now: {})", removed, catalog.count()?);
    Ok(())
}

/// Describe a live file and look it up both ways.
fn run_info(file: &Path, catalog_path: &Path) -> Result<()> {
    let record = extract(file).wrap_err_with(|| format!("Cannot read {}", file.display()))?;
    println!("{}", record.describe());

    if !catalog_path.exists() {
        println!("No catalog at {}", catalog_path.display());
        return Ok(());
    }
    let catalog = open_existing(catalog_path)?;

    println!();
    println!(
        "Known by size and times: {}",
        yes_no(catalog.exists_fast_record(&record)?)
    );
    println!(
        "Known by content:        {}",
        yes_no(catalog.exists_by_hash_record(&record)?)
    );
    Ok(())
}

/// Ask a y/N question on stdin.
fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
