//! Turning a filesystem path into a [`FileRecord`].

use std::fs::Metadata;
use std::path::Path;

use filedex_core::{FileRecord, FileStat, ScanError};

use crate::hasher::hash_file;

/// Observe a file: hash its content and capture its stat fields.
///
/// The path is made absolute against the current directory but symlinks are
/// not resolved, so a record names the file the way the walk reached it.
pub fn extract(path: impl AsRef<Path>) -> Result<FileRecord, ScanError> {
    let path = path.as_ref();
    let absolute = std::path::absolute(path).map_err(|e| ScanError::io(path, e))?;
    let metadata = std::fs::metadata(&absolute).map_err(|e| ScanError::io(&absolute, e))?;
    let digest = hash_file(&absolute)?;

    Ok(FileRecord::new(
        digest,
        absolute.to_string_lossy(),
        stat_from_metadata(&metadata),
    ))
}

/// Read the stat fields of a live path (following symlinks).
pub fn stat_path(path: impl AsRef<Path>) -> Result<FileStat, ScanError> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|e| ScanError::io(path, e))?;
    Ok(stat_from_metadata(&metadata))
}

/// Convert platform metadata into a [`FileStat`].
#[cfg(unix)]
pub fn stat_from_metadata(metadata: &Metadata) -> FileStat {
    use std::os::unix::fs::MetadataExt;

    let atime_ns = to_ns(metadata.atime(), metadata.atime_nsec());
    let mtime_ns = to_ns(metadata.mtime(), metadata.mtime_nsec());
    let ctime_ns = to_ns(metadata.ctime(), metadata.ctime_nsec());

    let mut stat = FileStat::new(metadata.size(), atime_ns, mtime_ns, ctime_ns);
    let extra = &mut stat.extra;
    extra.insert("st_mode".into(), metadata.mode().into());
    extra.insert("st_ino".into(), metadata.ino().into());
    extra.insert("st_dev".into(), metadata.dev().into());
    extra.insert("st_nlink".into(), metadata.nlink().into());
    extra.insert("st_uid".into(), metadata.uid().into());
    extra.insert("st_gid".into(), metadata.gid().into());
    extra.insert("st_blocks".into(), metadata.blocks().into());
    extra.insert("st_blksize".into(), metadata.blksize().into());
    stat
}

/// Convert platform metadata into a [`FileStat`].
///
/// Without a status-change time the creation time stands in for it.
#[cfg(not(unix))]
pub fn stat_from_metadata(metadata: &Metadata) -> FileStat {
    use std::time::{SystemTime, UNIX_EPOCH};

    fn system_time_ns(time: std::io::Result<SystemTime>) -> i64 {
        match time {
            Ok(t) => match t.duration_since(UNIX_EPOCH) {
                Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
                Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
            },
            Err(_) => 0,
        }
    }

    let mtime_ns = system_time_ns(metadata.modified());
    let atime_ns = metadata
        .accessed()
        .map_or(mtime_ns, |t| system_time_ns(Ok(t)));
    let ctime_ns = metadata
        .created()
        .map_or(mtime_ns, |t| system_time_ns(Ok(t)));

    FileStat::new(metadata.len(), atime_ns, mtime_ns, ctime_ns)
}

#[cfg(unix)]
fn to_ns(secs: i64, nsec: i64) -> i64 {
    secs.saturating_mul(1_000_000_000).saturating_add(nsec)
}
