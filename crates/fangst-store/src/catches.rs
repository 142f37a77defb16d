//! Typed operations for locally cached catches and their comments.

use fangst_shared::{CatchId, CatchRecord, CommentId, CommentRecord};

use crate::database::Database;
use crate::error::Result;
use crate::models::CacheKind;

impl Database {
    // ------------------------------------------------------------------
    // Catches
    // ------------------------------------------------------------------

    /// Append a locally saved catch and open its comment list.
    pub fn append_local_catch(&self, record: &CatchRecord) -> Result<()> {
        self.append(&CacheKind::Catches, record)?;
        tracing::info!(catch_id = %record.id, "catch stored in local cache");
        Ok(())
    }

    /// All locally saved catches in append order.
    pub fn local_catches(&self) -> Result<Vec<CatchRecord>> {
        self.list_all(&CacheKind::Catches)
    }

    pub fn local_catch(&self, id: &CatchId) -> Result<Option<CatchRecord>> {
        self.get_entry(&CacheKind::Catches, id.as_str())
    }

    /// Delete a local catch together with its comment list.
    pub fn remove_local_catch(&self, id: &CatchId) -> Result<bool> {
        self.remove_if_present(&CacheKind::Catches, id.as_str())
    }

    pub fn set_local_catch_visibility(
        &self,
        id: &CatchId,
        is_public: bool,
    ) -> Result<Option<CatchRecord>> {
        self.update_entry(&CacheKind::Catches, id.as_str(), |c: &mut CatchRecord| {
            c.is_public = is_public;
        })
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    /// Append a comment to a catch's local list.
    ///
    /// Returns the parent's new comment count when the parent is a cached catch.
    pub fn append_local_comment(&self, comment: &CommentRecord) -> Result<Option<u32>> {
        self.append(&CacheKind::Comments(comment.catch_id.clone()), comment)?;
        Ok(self.local_catch(&comment.catch_id)?.map(|c| c.comments_count))
    }

    pub fn local_comments(&self, catch_id: &CatchId) -> Result<Vec<CommentRecord>> {
        self.list_all(&CacheKind::Comments(catch_id.clone()))
    }

    /// Remove a local comment, decrementing the parent's count (floored at 0).
    pub fn remove_local_comment(&self, catch_id: &CatchId, comment_id: &CommentId) -> Result<bool> {
        self.remove_if_present(&CacheKind::Comments(catch_id.clone()), comment_id.as_str())
    }
}
