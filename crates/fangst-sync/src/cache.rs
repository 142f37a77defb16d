//! Serialised access to the local durable cache.
//!
//! SQLite connections are not `Sync`; every engine component goes through one
//! [`LocalCache`] handle, which holds the connection behind a mutex so
//! concurrent appends queue instead of racing. Every successful write bumps a
//! revision counter so views built on the cache can recompute.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use fangst_shared::{CatchId, CatchRecord, CommentId, CommentRecord};
use fangst_store::{CacheKind, CacheRecord, Database, NamespaceInfo, StoreError};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

#[derive(Clone)]
pub struct LocalCache {
    db: Arc<Mutex<Database>>,
    revision: Arc<watch::Sender<u64>>,
}

impl LocalCache {
    pub fn new(db: Database) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            db: Arc::new(Mutex::new(db)),
            revision: Arc::new(revision),
        }
    }

    /// Fires after every write that changed the cache.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Open the cache at the configured path, or the platform default.
    pub fn open(config: &SyncConfig) -> Result<Self> {
        let db = match &config.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        Ok(Self::new(db))
    }

    fn with<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Database) -> std::result::Result<R, StoreError>,
    {
        let db = self
            .db
            .lock()
            .map_err(|_| SyncError::IrrecoverableFailure("local cache lock poisoned".into()))?;
        f(&db).map_err(SyncError::from)
    }

    fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Database) -> std::result::Result<R, StoreError>,
    {
        let result = self.with(f)?;
        self.revision.send_modify(|rev| *rev += 1);
        Ok(result)
    }

    // Generic contract

    pub fn append<T: CacheRecord>(&self, kind: &CacheKind, record: &T) -> Result<()> {
        self.write(|db| db.append(kind, record))
    }

    pub fn list_all<T: CacheRecord>(&self, kind: &CacheKind) -> Result<Vec<T>> {
        self.with(|db| db.list_all(kind))
    }

    pub fn remove_if_present(&self, kind: &CacheKind, id: &str) -> Result<bool> {
        self.write(|db| db.remove_if_present(kind, id))
    }

    pub fn namespaces(&self) -> Result<Vec<NamespaceInfo>> {
        self.with(|db| db.list_namespaces())
    }

    // Typed helpers

    pub fn append_catch(&self, record: &CatchRecord) -> Result<()> {
        self.write(|db| db.append_local_catch(record))
    }

    pub fn catches(&self) -> Result<Vec<CatchRecord>> {
        self.with(|db| db.local_catches())
    }

    pub fn catch(&self, id: &CatchId) -> Result<Option<CatchRecord>> {
        self.with(|db| db.local_catch(id))
    }

    pub fn remove_catch(&self, id: &CatchId) -> Result<bool> {
        self.write(|db| db.remove_local_catch(id))
    }

    pub fn set_catch_visibility(&self, id: &CatchId, is_public: bool) -> Result<Option<CatchRecord>> {
        self.write(|db| db.set_local_catch_visibility(id, is_public))
    }

    pub fn append_comment(&self, comment: &CommentRecord) -> Result<Option<u32>> {
        self.write(|db| db.append_local_comment(comment))
    }

    pub fn comments(&self, catch_id: &CatchId) -> Result<Vec<CommentRecord>> {
        self.with(|db| db.local_comments(catch_id))
    }

    pub fn remove_comment(&self, catch_id: &CatchId, comment_id: &CommentId) -> Result<bool> {
        self.write(|db| db.remove_local_comment(catch_id, comment_id))
    }
}
