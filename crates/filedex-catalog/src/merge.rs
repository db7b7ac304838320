//! Merging independently produced catalogs.

use std::path::Path;

use rusqlite::{Connection, ErrorCode, OpenFlags};
use tracing::{info, warn};

use crate::catalog::{Catalog, read_keys};
use crate::error::{CatalogError, Result};

impl Catalog {
    /// Copy rows from the catalog at `source` whose dedup key is absent here.
    ///
    /// A source that is missing, unreadable or not a catalog is skipped with
    /// a warning and `Ok(0)`; this catalog is left unchanged. The source is
    /// opened read-only. Running the same merge again adds nothing.
    pub fn merge_from(&mut self, source: impl AsRef<Path>) -> Result<usize> {
        let source = source.as_ref();
        match Self::validate(source) {
            Ok(true) => {}
            Ok(false) => {
                warn!(source = %source.display(), "Not a valid catalog, nothing merged");
                return Ok(0);
            }
            Err(CatalogError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == ErrorCode::CannotOpen =>
            {
                warn!(source = %source.display(), "Cannot open catalog, nothing merged");
                return Ok(0);
            }
            Err(e) => return Err(e),
        }

        let keys = {
            let conn = Connection::open_with_flags(
                source,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_keys(&conn)?
        };

        let added = self.insert_keys(&keys)?;
        info!(
            source = %source.display(),
            read = keys.len(),
            added,
            "Merged catalog"
        );
        Ok(added)
    }

    /// Copy rows from another open catalog whose dedup key is absent here.
    pub fn merge(&mut self, other: &Catalog) -> Result<usize> {
        let keys = other.keys()?;
        let added = self.insert_keys(&keys)?;
        info!(read = keys.len(), added, "Merged catalog");
        Ok(added)
    }
}
