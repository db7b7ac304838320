//! Scan snapshots and their JSON file form.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::record::FileRecord;

/// Result of one scan: where and on what host it ran, plus every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Host platform descriptor.
    pub system: String,
    /// Absolute root of the scan.
    pub scan_directory: String,
    /// When the scan ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_at: Option<DateTime<Local>>,
    /// Records in walk order.
    pub files: Vec<FileRecord>,
}

impl Snapshot {
    /// Create a snapshot stamped with the current time.
    pub fn new(
        system: impl Into<String>,
        scan_directory: impl Into<String>,
        files: Vec<FileRecord>,
    ) -> Self {
        Self {
            system: system.into(),
            scan_directory: scan_directory.into(),
            scanned_at: Some(Local::now()),
            files,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the scan produced no records.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// File name used when saving, `filescan_YYYYmmddHHMMSS.json`.
    pub fn file_name(&self) -> String {
        let stamp = self.scanned_at.unwrap_or_else(Local::now);
        format!("filescan_{}.json", stamp.format("%Y%m%d%H%M%S"))
    }

    /// Encode as pretty JSON with four-space indentation.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }

    /// Write the snapshot into `dir` and return the written path.
    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ScanError> {
        let path = dir.as_ref().join(self.file_name());
        self.save(&path)?;
        Ok(path)
    }

    /// Write the snapshot to an explicit path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ScanError> {
        let path = path.as_ref();
        let json = self.to_json().map_err(|source| ScanError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|e| ScanError::io(path, e))
    }

    /// Read a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ScanError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| ScanError::Snapshot {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileStat;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        let record = FileRecord::new(
            "0123456789abcdef0123456789abcdef",
            "/data/a.txt",
            FileStat::new(10, 1_700_000_000_123_456_789, 1_700_000_001_000_000_000, 1_700_000_002_000_000_000),
        );
        Snapshot::new("Linux-x86_64", "/data", vec![record])
    }

    #[test]
    fn test_file_name_pattern() {
        let name = sample().file_name();
        assert!(name.starts_with("filescan_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "filescan_".len() + 14 + ".json".len());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let snapshot = sample();

        let path = snapshot.save_to_dir(temp.path()).unwrap();
        let loaded = Snapshot::load(&path).unwrap();

        assert_eq!(loaded.system, snapshot.system);
        assert_eq!(loaded.scan_directory, snapshot.scan_directory);
        assert_eq!(loaded.files, snapshot.files);
    }

    #[test]
    fn test_load_without_timestamp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scan.json");
        fs::write(
            &path,
            r#"{"system": "x", "scan_directory": "/d", "files": [
                {"md5": "aa", "path": "/d/f", "earliest_timestamp": 1.5,
                 "stat": {"st_size": 3, "st_atime_ns": 1500000000, "st_mtime_ns": 2000000000,
                          "st_ctime_ns": 2000000000, "st_nlink": 1}}]}"#,
        )
        .unwrap();

        let snapshot = Snapshot::load(&path).unwrap();
        assert!(snapshot.scanned_at.is_none());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.files[0].stat.extra["st_nlink"], 1);
    }

    #[test]
    fn test_load_malformed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(Snapshot::load(&path), Err(ScanError::Snapshot { .. })));
    }
}
