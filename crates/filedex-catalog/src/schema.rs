//! Catalog table layout and schema identity checks.
//!
//! The table name, column names and declared types are the compatibility
//! surface other tools rely on. A file only counts as a catalog when its
//! `files` table matches [`COLUMNS`] exactly.

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension};

/// Name of the single catalog table.
pub const TABLE: &str = "files";

/// Name of the secondary index on the digest column.
pub const MD5_INDEX: &str = "idx_files_md5";

/// Every column with its declared type, in table order.
pub const COLUMNS: &[(&str, &str)] = &[
    ("id", "INTEGER"),
    ("md5", "TEXT"),
    ("path", "TEXT"),
    ("ctime", "REAL"),
    ("st_atime_ns", "INTEGER"),
    ("st_mtime_ns", "INTEGER"),
    ("st_ctime_ns", "INTEGER"),
    ("st_size", "INTEGER"),
];

/// Columns forming the dedup key (everything except `id`), in table order.
pub const KEY_COLUMNS: &str = "md5, path, ctime, st_atime_ns, st_mtime_ns, st_ctime_ns, st_size";

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        md5 TEXT,
        path TEXT,
        ctime REAL,
        st_atime_ns INTEGER,
        st_mtime_ns INTEGER,
        st_ctime_ns INTEGER,
        st_size INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_files_md5 ON files (md5);
";

/// Create the table and index if they are missing.
pub fn ensure(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_TABLE)
}

/// Whether the connection holds a `files` table with exactly the expected
/// columns and declared types.
pub fn matches(conn: &Connection) -> rusqlite::Result<bool> {
    let table: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TABLE],
            |row| row.get(0),
        )
        .optional()?;
    if table.is_none() {
        return Ok(false);
    }

    let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1)")?;
    let found = stmt
        .query_map([TABLE], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<BTreeMap<String, String>>>()?;

    let expected: BTreeMap<String, String> = COLUMNS
        .iter()
        .map(|(name, ty)| (name.to_string(), ty.to_string()))
        .collect();

    Ok(found == expected)
}
