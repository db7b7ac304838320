//! Persisted row types.

use rusqlite::Row;
use serde::{Deserialize, Serialize};

use filedex_core::FileRecord;

use crate::error::{CatalogError, Result};

/// The seven non-id columns of a row.
///
/// No two rows of a catalog share a key. Rows with the same `md5` but
/// different keys are content duplicates or repeat observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupKey {
    pub md5: String,
    pub path: String,
    pub ctime: f64,
    pub st_atime_ns: i64,
    pub st_mtime_ns: i64,
    pub st_ctime_ns: i64,
    pub st_size: i64,
}

impl DedupKey {
    /// Build the key for a record, rejecting records that cannot be stored.
    pub fn from_record(record: &FileRecord) -> Result<Self> {
        if record.digest.is_empty() {
            return Err(CatalogError::invalid_input(format!(
                "record for {:?} has no digest",
                record.path
            )));
        }
        if record.path.is_empty() {
            return Err(CatalogError::invalid_input(format!(
                "record with digest {} has no path",
                record.digest
            )));
        }
        let st_size = i64::try_from(record.stat.st_size).map_err(|_| {
            CatalogError::invalid_input(format!("size of {:?} out of range", record.path))
        })?;

        Ok(Self {
            md5: record.digest.clone(),
            path: record.path.clone(),
            ctime: record.earliest_timestamp,
            st_atime_ns: record.stat.st_atime_ns,
            st_mtime_ns: record.stat.st_mtime_ns,
            st_ctime_ns: record.stat.st_ctime_ns,
            st_size,
        })
    }

    /// Read a key from a row selected as [`KEY_COLUMNS`](crate::schema::KEY_COLUMNS).
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            md5: row.get(0)?,
            path: row.get(1)?,
            ctime: row.get(2)?,
            st_atime_ns: row.get(3)?,
            st_mtime_ns: row.get(4)?,
            st_ctime_ns: row.get(5)?,
            st_size: row.get(6)?,
        })
    }
}

/// One stored file observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub id: i64,
    #[serde(flatten)]
    pub key: DedupKey,
}

impl CatalogRow {
    /// Read a full row selected as `id, md5, path, ...`.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            key: DedupKey {
                md5: row.get(1)?,
                path: row.get(2)?,
                ctime: row.get(3)?,
                st_atime_ns: row.get(4)?,
                st_mtime_ns: row.get(5)?,
                st_ctime_ns: row.get(6)?,
                st_size: row.get(7)?,
            },
        })
    }
}

/// A digest stored in more than one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub md5: String,
    pub count: u64,
}
