//! The SQLite-backed catalog.

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OpenFlags, Transaction, params, params_from_iter};
use tracing::{debug, info, warn};

use filedex_core::{FastKey, FileRecord, KnownFiles, LookupError, RecordQuery};

use crate::error::{CatalogError, Result};
use crate::row::{CatalogRow, DedupKey, DuplicateGroup};
use crate::schema::{self, KEY_COLUMNS};

/// Catalog file used when none is given.
pub const DEFAULT_CATALOG_PATH: &str = "data.sqlite";

/// Durable catalog of file observations keyed by content hash.
///
/// The catalog owns its connection, so it is the single writer for its file:
/// every mutating call takes `&mut self` and runs in one transaction, which
/// keeps the check-then-insert of each dedup key atomic.
pub struct Catalog {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Catalog {
    /// Open the catalog at `path`, creating it if the file does not exist.
    ///
    /// An existing file must already be a catalog; anything else is refused
    /// with [`CatalogError::InvalidStore`] and left untouched.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let existed = path.exists();
        if existed && !Self::validate(path)? {
            return Err(CatalogError::InvalidStore {
                path: path.to_path_buf(),
            });
        }

        let conn = Connection::open(path)?;
        schema::ensure(&conn)?;

        if existed {
            debug!(path = %path.display(), "Catalog opened");
        } else {
            info!(path = %path.display(), "Catalog created");
        }

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a fresh catalog held in memory.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::ensure(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Whether the file at `path` is a catalog with the expected schema.
    ///
    /// Missing files, directories and non-SQLite files are not catalogs.
    /// The file is opened read-only and never modified.
    pub fn validate(path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(false);
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        match schema::matches(&conn) {
            Ok(matches) => Ok(matches),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::NotADatabase => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Backing file, `None` for in-memory catalogs.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of stored rows.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Store records whose dedup key is not present yet.
    ///
    /// Colliding records are skipped silently. Returns the number of rows
    /// added. The whole batch is validated before anything is written.
    pub fn ingest(&mut self, records: &[FileRecord]) -> Result<usize> {
        if records.is_empty() {
            return Err(CatalogError::invalid_input("nothing to ingest"));
        }
        let keys = records
            .iter()
            .map(DedupKey::from_record)
            .collect::<Result<Vec<_>>>()?;

        let added = self.insert_keys(&keys)?;
        let total = self.count()?;
        info!(added, total, "Update {added} items (now: {total})");
        Ok(added)
    }

    /// Insert the keys that are absent, in one transaction.
    pub(crate) fn insert_keys(&mut self, keys: &[DedupKey]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut added = 0;
        for key in keys {
            if insert_if_absent(&tx, key)? {
                added += 1;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    /// Every stored dedup key, in id order.
    pub(crate) fn keys(&self) -> Result<Vec<DedupKey>> {
        read_keys(&self.conn)
    }

    /// Whether any row has the same size, mtime and ctime.
    ///
    /// No hashing involved, so a file whose times changed is missed and two
    /// different files sharing all three values are taken for one.
    pub fn exists_fast(&self, key: &FastKey) -> Result<bool> {
        let Ok(size) = i64::try_from(key.st_size) else {
            return Ok(false);
        };
        let mut stmt = self.conn.prepare_cached(
            "SELECT 1 FROM files WHERE st_size = ?1 AND st_mtime_ns = ?2 AND st_ctime_ns = ?3 LIMIT 1",
        )?;
        Ok(stmt.exists(params![size, key.st_mtime_ns, key.st_ctime_ns])?)
    }

    /// [`exists_fast`](Self::exists_fast) for a record.
    pub fn exists_fast_record(&self, record: &FileRecord) -> Result<bool> {
        self.exists_fast(&record.stat.fast_key())
    }

    /// Whether any row carries this content digest.
    pub fn exists_by_hash(&self, md5: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM files WHERE md5 = ?1 LIMIT 1")?;
        Ok(stmt.exists([md5])?)
    }

    /// [`exists_by_hash`](Self::exists_by_hash) for a record.
    pub fn exists_by_hash_record(&self, record: &FileRecord) -> Result<bool> {
        self.exists_by_hash(&record.digest)
    }

    /// Digests stored in more than one row, most repeated first.
    pub fn duplicate_groups(&self) -> Result<Vec<DuplicateGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT md5, COUNT(*) FROM files GROUP BY md5 HAVING COUNT(*) > 1 \
             ORDER BY COUNT(*) DESC, md5",
        )?;
        let groups = stmt
            .query_map([], |row| {
                Ok(DuplicateGroup {
                    md5: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    /// Rows sharing one digest.
    pub fn duplicate_rows(&self, md5: &str) -> Result<Vec<CatalogRow>> {
        self.select(&RecordQuery::new().md5(md5))
    }

    /// Rows matching every condition set in `query`, in id order.
    ///
    /// An empty query is refused rather than dumping the whole table.
    pub fn select(&self, query: &RecordQuery) -> Result<Vec<CatalogRow>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(id) = query.id {
            clauses.push("id = ?");
            values.push(Value::Integer(id));
        }
        if let Some(ref md5) = query.md5 {
            clauses.push("md5 = ?");
            values.push(Value::Text(md5.clone()));
        }
        if let Some(ref path) = query.path {
            clauses.push("path = ?");
            values.push(Value::Text(path.clone()));
        }
        if let Some(ctime) = query.ctime {
            clauses.push("ctime = ?");
            values.push(Value::Real(ctime));
        }
        if let Some(ns) = query.st_atime_ns {
            clauses.push("st_atime_ns = ?");
            values.push(Value::Integer(ns));
        }
        if let Some(ns) = query.st_mtime_ns {
            clauses.push("st_mtime_ns = ?");
            values.push(Value::Integer(ns));
        }
        if let Some(ns) = query.st_ctime_ns {
            clauses.push("st_ctime_ns = ?");
            values.push(Value::Integer(ns));
        }
        if let Some(size) = query.st_size {
            let size = i64::try_from(size)
                .map_err(|_| CatalogError::invalid_input(format!("size {size} out of range")))?;
            clauses.push("st_size = ?");
            values.push(Value::Integer(size));
        }

        if clauses.is_empty() {
            warn!("Select called without conditions");
            return Err(CatalogError::invalid_input("no conditions specified"));
        }

        let sql = format!(
            "SELECT id, {KEY_COLUMNS} FROM files WHERE {} ORDER BY id",
            clauses.join(" AND ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), CatalogRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Delete rows by id. Unknown ids are ignored. Returns rows removed.
    pub fn delete(&mut self, ids: &[i64]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM files WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute([id])?;
            }
        }
        tx.commit()?;
        debug!(requested = ids.len(), removed, "Deleted rows");
        Ok(removed)
    }
}

impl KnownFiles for Catalog {
    fn exists_fast(&self, key: &FastKey) -> std::result::Result<bool, LookupError> {
        Catalog::exists_fast(self, key).map_err(LookupError::from_source)
    }
}

fn insert_if_absent(tx: &Transaction<'_>, key: &DedupKey) -> Result<bool> {
    let values = params![
        key.md5,
        key.path,
        key.ctime,
        key.st_atime_ns,
        key.st_mtime_ns,
        key.st_ctime_ns,
        key.st_size,
    ];

    // The md5 index narrows the lookup to one content group.
    let exists = tx
        .prepare_cached(
            "SELECT 1 FROM files WHERE md5 = ?1 AND path = ?2 AND ctime = ?3 \
             AND st_atime_ns = ?4 AND st_mtime_ns = ?5 AND st_ctime_ns = ?6 AND st_size = ?7 \
             LIMIT 1",
        )?
        .exists(values)?;
    if exists {
        return Ok(false);
    }

    tx.prepare_cached(&format!(
        "INSERT INTO files ({KEY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
    ))?
    .execute(values)?;
    Ok(true)
}

pub(crate) fn read_keys(conn: &Connection) -> Result<Vec<DedupKey>> {
    let mut stmt = conn.prepare(&format!("SELECT {KEY_COLUMNS} FROM files ORDER BY id"))?;
    let keys = stmt
        .query_map([], DedupKey::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filedex_core::FileStat;

    fn record(md5: &str, path: &str, size: u64, mtime_ns: i64) -> FileRecord {
        FileRecord::new(md5, path, FileStat::new(size, mtime_ns, mtime_ns, mtime_ns))
    }

    #[test]
    fn test_ingest_and_count() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let added = catalog
            .ingest(&[record("aa", "/a", 1, 10), record("bb", "/b", 2, 20)])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(catalog.count().unwrap(), 2);
    }

    #[test]
    fn test_ingest_skips_duplicates_within_batch() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let r = record("aa", "/a", 1, 10);
        assert_eq!(catalog.ingest(&[r.clone(), r]).unwrap(), 1);
    }

    #[test]
    fn test_ingest_empty_batch() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        assert!(matches!(
            catalog.ingest(&[]),
            Err(CatalogError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_ingest_malformed_batch_writes_nothing() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let batch = [record("aa", "/a", 1, 10), record("", "/b", 1, 10)];
        assert!(catalog.ingest(&batch).is_err());
        assert_eq!(catalog.count().unwrap(), 0);
    }

    #[test]
    fn test_select_requires_conditions() {
        let catalog = Catalog::open_in_memory().unwrap();
        assert!(matches!(
            catalog.select(&RecordQuery::new()),
            Err(CatalogError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_select_conjunction() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        catalog
            .ingest(&[
                record("aa", "/a", 1, 10),
                record("aa", "/b", 1, 10),
                record("bb", "/c", 1, 10),
            ])
            .unwrap();

        assert_eq!(catalog.select(&RecordQuery::new().md5("aa")).unwrap().len(), 2);
        let rows = catalog
            .select(&RecordQuery::new().md5("aa").path("/b"))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key.path, "/b");
        assert_eq!(catalog.select(&RecordQuery::new().st_size(1)).unwrap().len(), 3);
        assert!(catalog.select(&RecordQuery::new().md5("zz")).unwrap().is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        catalog.ingest(&[record("aa", "/a", 1, 10)]).unwrap();
        let id = catalog.select(&RecordQuery::new().md5("aa")).unwrap()[0].id;

        assert_eq!(catalog.delete(&[id, 9999]).unwrap(), 1);
        assert_eq!(catalog.delete(&[id]).unwrap(), 0);
        assert_eq!(catalog.count().unwrap(), 0);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        catalog.ingest(&[record("aa", "/a", 1, 10)]).unwrap();
        let first = catalog.select(&RecordQuery::new().md5("aa")).unwrap()[0].id;
        catalog.delete(&[first]).unwrap();

        catalog.ingest(&[record("aa", "/a", 1, 10)]).unwrap();
        let second = catalog.select(&RecordQuery::new().md5("aa")).unwrap()[0].id;
        assert!(second > first);
    }

    #[test]
    fn test_exists_checks() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let r = record("aa", "/a", 5, 100);
        catalog.ingest(&[r.clone()]).unwrap();

        assert!(catalog.exists_fast_record(&r).unwrap());
        assert!(catalog.exists_by_hash_record(&r).unwrap());

        let touched = record("aa", "/a", 5, 200);
        assert!(!catalog.exists_fast_record(&touched).unwrap());
        assert!(catalog.exists_by_hash_record(&touched).unwrap());

        assert!(!catalog.exists_by_hash("bb").unwrap());
    }

    #[test]
    fn test_known_files_impl() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let r = record("aa", "/a", 5, 100);
        catalog.ingest(&[r.clone()]).unwrap();

        let known: &dyn KnownFiles = &catalog;
        assert!(known.exists_fast(&r.stat.fast_key()).unwrap());
    }
}
