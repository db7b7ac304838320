//! Typed equality filters over catalog columns.

use serde::{Deserialize, Serialize};

/// Conjunction of exact-equality conditions over catalog columns.
///
/// Unset fields do not constrain the result. A query with no fields set is
/// rejected by the catalog instead of returning every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub id: Option<i64>,
    pub md5: Option<String>,
    pub path: Option<String>,
    pub ctime: Option<f64>,
    pub st_atime_ns: Option<i64>,
    pub st_mtime_ns: Option<i64>,
    pub st_ctime_ns: Option<i64>,
    pub st_size: Option<u64>,
}

impl RecordQuery {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn md5(mut self, md5: impl Into<String>) -> Self {
        self.md5 = Some(md5.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn ctime(mut self, ctime: f64) -> Self {
        self.ctime = Some(ctime);
        self
    }

    pub fn st_atime_ns(mut self, ns: i64) -> Self {
        self.st_atime_ns = Some(ns);
        self
    }

    pub fn st_mtime_ns(mut self, ns: i64) -> Self {
        self.st_mtime_ns = Some(ns);
        self
    }

    pub fn st_ctime_ns(mut self, ns: i64) -> Self {
        self.st_ctime_ns = Some(ns);
        self
    }

    pub fn st_size(mut self, size: u64) -> Self {
        self.st_size = Some(size);
        self
    }

    /// True when no condition is set.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.md5.is_none()
            && self.path.is_none()
            && self.ctime.is_none()
            && self.st_atime_ns.is_none()
            && self.st_mtime_ns.is_none()
            && self.st_ctime_ns.is_none()
            && self.st_size.is_none()
    }
}
