//! Cache addressing types.

use fangst_shared::records::Versioned;
use fangst_shared::{CatchId, CatchRecord, CommentRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Namespace holding every locally saved catch.
pub const CATCHES_NAMESPACE: &str = "local_catches";

/// Prefix of the per-catch comment namespaces.
pub const COMMENTS_NAMESPACE_PREFIX: &str = "comments_";

/// Which append-ordered list a cache operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKind {
    /// Catches that could not be written remotely.
    Catches,
    /// Comments attached to one catch.
    Comments(CatchId),
}

impl CacheKind {
    pub fn namespace(&self) -> String {
        match self {
            CacheKind::Catches => CATCHES_NAMESPACE.to_string(),
            CacheKind::Comments(catch_id) => format!("{COMMENTS_NAMESPACE_PREFIX}{catch_id}"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CacheKind::Catches => "catches",
            CacheKind::Comments(_) => "comments",
        }
    }

    fn parent(&self) -> Option<&CatchId> {
        match self {
            CacheKind::Catches => None,
            CacheKind::Comments(catch_id) => Some(catch_id),
        }
    }

    pub(crate) fn parent_str(&self) -> Option<&str> {
        self.parent().map(CatchId::as_str)
    }
}

/// A record that can live in the cache, keyed by its own id.
pub trait CacheRecord: Serialize + DeserializeOwned + Versioned {
    fn cache_id(&self) -> &str;
}

impl CacheRecord for CatchRecord {
    fn cache_id(&self) -> &str {
        self.id.as_str()
    }
}

impl CacheRecord for CommentRecord {
    fn cache_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Summary row for one namespace, used by inspection tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub name: String,
    pub kind: String,
    pub parent_id: Option<String>,
    pub entries: u64,
}
