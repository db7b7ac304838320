//! Lookup seam between the scanner and a catalog.

use crate::error::LookupError;
use crate::record::FastKey;

/// Something that can tell whether a file was already indexed.
///
/// The scanner consults this while filtering so unchanged files are skipped
/// before they are hashed.
pub trait KnownFiles {
    /// Whether an observation with the same size, mtime and ctime exists.
    fn exists_fast(&self, key: &FastKey) -> Result<bool, LookupError>;
}

impl<T: KnownFiles + ?Sized> KnownFiles for &T {
    fn exists_fast(&self, key: &FastKey) -> Result<bool, LookupError> {
        (**self).exists_fast(key)
    }
}

impl KnownFiles for std::collections::HashSet<FastKey> {
    fn exists_fast(&self, key: &FastKey) -> Result<bool, LookupError> {
        Ok(self.contains(key))
    }
}
