use filedex_catalog::{Catalog, CatalogError, DedupKey, RecordQuery};
use filedex_core::{FileRecord, FileStat};
use std::fs;
use tempfile::TempDir;

fn record(md5: &str, path: &str, size: u64, ns: i64) -> FileRecord {
    FileRecord::new(md5, path, FileStat::new(size, ns, ns + 1, ns + 2))
}

fn sample_batch() -> Vec<FileRecord> {
    vec![
        record("0cc175b9c0f1b6a831c399e269772661", "/data/a", 1, 1_000),
        record("92eb5ffee6ae2fec3ad71c777531578f", "/data/b", 1, 2_000),
        record("4a8a08f09d37b73795649038408b5f33", "/data/c", 1, 3_000),
    ]
}

/// Every pair of rows differs somewhere outside the id.
fn assert_keys_unique(catalog: &Catalog) {
    let mut keys: Vec<DedupKey> = Vec::new();
    for md5 in ["0cc175b9c0f1b6a831c399e269772661", "92eb5ffee6ae2fec3ad71c777531578f", "4a8a08f09d37b73795649038408b5f33", "dup"] {
        for row in catalog.select(&RecordQuery::new().md5(md5)).unwrap() {
            assert!(!keys.contains(&row.key), "duplicate key {:?}", row.key);
            keys.push(row.key);
        }
    }
    assert_eq!(keys.len() as u64, catalog.count().unwrap());
}

#[test]
fn test_open_creates_store() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sqlite");

    assert!(!Catalog::validate(&path).unwrap());
    let catalog = Catalog::open(&path).unwrap();
    assert_eq!(catalog.path(), Some(path.as_path()));
    assert_eq!(catalog.count().unwrap(), 0);
    drop(catalog);

    assert!(Catalog::validate(&path).unwrap());
    // Reopening an initialized store keeps it valid.
    let catalog = Catalog::open(&path).unwrap();
    assert_eq!(catalog.count().unwrap(), 0);
}

#[test]
fn test_open_rejects_foreign_sqlite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("other.sqlite");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
    }

    let err = Catalog::open(&path).err().unwrap();
    assert!(matches!(err, CatalogError::InvalidStore { .. }));

    // The foreign store was not touched.
    let conn = rusqlite::Connection::open(&path).unwrap();
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'files'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 0);
}

#[test]
fn test_open_rejects_non_database_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("notes.txt");
    fs::write(&path, "this is definitely not an sqlite database file").unwrap();

    assert!(!Catalog::validate(&path).unwrap());
    assert!(matches!(
        Catalog::open(&path),
        Err(CatalogError::InvalidStore { .. })
    ));
}

#[test]
fn test_ingest_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let mut catalog = Catalog::open(temp.path().join("data.sqlite")).unwrap();
    let batch = sample_batch();

    assert_eq!(catalog.ingest(&batch).unwrap(), 3);
    assert_eq!(catalog.ingest(&batch).unwrap(), 0);
    assert_eq!(catalog.count().unwrap(), 3);
    assert_keys_unique(&catalog);
}

#[test]
fn test_same_digest_different_paths_are_kept() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    catalog
        .ingest(&[record("dup", "/one", 4, 10), record("dup", "/two", 4, 10)])
        .unwrap();

    let groups = catalog.duplicate_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].md5, "dup");
    assert_eq!(groups[0].count, 2);

    let rows = catalog.duplicate_rows("dup").unwrap();
    let paths: Vec<&str> = rows.iter().map(|r| r.key.path.as_str()).collect();
    assert_eq!(paths, vec!["/one", "/two"]);
}

#[test]
fn test_no_duplicate_groups_for_unique_content() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    catalog.ingest(&sample_batch()).unwrap();
    assert!(catalog.duplicate_groups().unwrap().is_empty());
}

#[test]
fn test_merge_adds_only_missing_rows() {
    let temp = TempDir::new().unwrap();
    let a_path = temp.path().join("a.sqlite");
    let b_path = temp.path().join("b.sqlite");

    let mut a = Catalog::open(&a_path).unwrap();
    a.ingest(&sample_batch()[..2]).unwrap();

    {
        let mut b = Catalog::open(&b_path).unwrap();
        let mut batch = sample_batch();
        batch.push(record("dup", "/elsewhere", 9, 9_000));
        b.ingest(&batch).unwrap();
    }

    // b holds c and dup that a lacks
    assert_eq!(a.merge_from(&b_path).unwrap(), 2);
    assert_eq!(a.count().unwrap(), 4);
    assert_eq!(a.merge_from(&b_path).unwrap(), 0);
    assert_keys_unique(&a);

    // Source untouched
    let b = Catalog::open(&b_path).unwrap();
    assert_eq!(b.count().unwrap(), 4);
}

#[test]
fn test_merge_invalid_source_leaves_destination_unchanged() {
    let temp = TempDir::new().unwrap();
    let mut catalog = Catalog::open(temp.path().join("data.sqlite")).unwrap();
    catalog.ingest(&sample_batch()).unwrap();

    let foreign = temp.path().join("foreign.sqlite");
    {
        let conn = rusqlite::Connection::open(&foreign).unwrap();
        conn.execute_batch(
            "CREATE TABLE files (id INTEGER PRIMARY KEY, md5 TEXT, path TEXT);
             INSERT INTO files (md5, path) VALUES ('x', '/x');",
        )
        .unwrap();
    }
    let garbage = temp.path().join("garbage.sqlite");
    fs::write(&garbage, vec![0x42u8; 4096]).unwrap();

    assert_eq!(catalog.merge_from(&foreign).unwrap(), 0);
    assert_eq!(catalog.merge_from(&garbage).unwrap(), 0);
    assert_eq!(catalog.count().unwrap(), 3);
}

#[test]
fn test_select_by_each_field() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    let r = record("0cc175b9c0f1b6a831c399e269772661", "/data/a", 1, 1_000);
    catalog.ingest(&[r.clone()]).unwrap();
    let id = catalog.select(&RecordQuery::new().path("/data/a")).unwrap()[0].id;

    let queries = [
        RecordQuery::new().id(id),
        RecordQuery::new().md5(&r.digest),
        RecordQuery::new().ctime(r.earliest_timestamp),
        RecordQuery::new().st_atime_ns(r.stat.st_atime_ns),
        RecordQuery::new().st_mtime_ns(r.stat.st_mtime_ns),
        RecordQuery::new().st_ctime_ns(r.stat.st_ctime_ns),
        RecordQuery::new().st_size(1),
    ];
    for query in &queries {
        let rows = catalog.select(query).unwrap();
        assert_eq!(rows.len(), 1, "query {query:?}");
        assert_eq!(rows[0].id, id);
    }
}

#[test]
fn test_delete_by_ids() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    catalog.ingest(&sample_batch()).unwrap();
    let ids: Vec<i64> = catalog
        .select(&RecordQuery::new().st_size(1))
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();

    assert_eq!(catalog.delete(&ids[..2]).unwrap(), 2);
    assert_eq!(catalog.delete(&ids[..2]).unwrap(), 0);
    assert_eq!(catalog.count().unwrap(), 1);
    assert!(catalog.delete(&[]).is_ok());
}

#[cfg(unix)]
#[test]
fn test_merge_skips_unreadable_source_and_continues() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let locked = temp.path().join("locked.sqlite");
    let readable = temp.path().join("readable.sqlite");
    Catalog::open(&locked)
        .unwrap()
        .ingest(&sample_batch()[..1])
        .unwrap();
    Catalog::open(&readable)
        .unwrap()
        .ingest(&sample_batch()[1..])
        .unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::File::open(&locked).is_ok() {
        // Permission bits do not bind this user.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let mut catalog = Catalog::open_in_memory().unwrap();
    let from_locked = catalog.merge_from(&locked);
    let from_readable = catalog.merge_from(&readable);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(from_locked.unwrap(), 0);
    assert_eq!(from_readable.unwrap(), 2);
    assert_eq!(catalog.count().unwrap(), 2);
}
