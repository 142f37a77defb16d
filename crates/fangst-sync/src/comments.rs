//! Comment threads on catches.
//!
//! Remote catches keep comments in `catches/{id}/comments` with an atomic
//! `commentsCount` on the parent. Local catches keep them in the local
//! cache's per-catch namespace. Placeholders have no thread.

use std::sync::Arc;

use fangst_shared::constants::SCHEMA_VERSION;
use fangst_shared::{CatchId, CommentId, CommentRecord, Timestamp, ValidationError};

use crate::context::SyncContext;
use crate::error::{RemoteError, Result, SyncError};
use crate::guard::{guarded_write, OnTimeout};
use crate::remote::{codec, comments_collection, server_timestamp, Direction, DocPath, FieldOp, Query};
use crate::session::ProfileSession;

#[derive(Clone)]
pub struct CommentService {
    ctx: SyncContext,
    session: Arc<ProfileSession>,
}

impl CommentService {
    pub fn new(ctx: SyncContext, session: Arc<ProfileSession>) -> Self {
        Self { ctx, session }
    }

    /// Oldest first.
    pub async fn list(&self, catch_id: &CatchId) -> Result<Vec<CommentRecord>> {
        if catch_id.is_placeholder() {
            return Ok(Vec::new());
        }
        if catch_id.is_local() {
            return self.ctx.cache.comments(catch_id);
        }

        let query = Query::collection(comments_collection(catch_id))
            .order_by("createdAt", Direction::Ascending);
        match tokio::time::timeout(self.ctx.config.feed_deadline, self.ctx.remote.query(&query)).await
        {
            Ok(Ok(snapshot)) => Ok(codec::decode_all(snapshot)),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(SyncError::TransientRemoteFailure("comment read timed out".into())),
        }
    }

    /// Post a comment as the signed-in user.
    ///
    /// Blank text is a validation error. A failed remote post is logged and
    /// reported as `Ok(None)`. If the parent's count cannot be raised the
    /// comment is removed again. A post that times out keeps running and may
    /// still land.
    pub async fn post(&self, catch_id: &CatchId, text: &str) -> Result<Option<CommentRecord>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::Blank("text").into());
        }
        if catch_id.is_placeholder() {
            return Err(SyncError::NotPermitted("placeholder catches have no comments"));
        }

        let profile = self.session.profile();
        let comment = CommentRecord {
            schema_version: SCHEMA_VERSION,
            id: if catch_id.is_local() {
                CommentId::new_local()
            } else {
                CommentId::new()
            },
            catch_id: catch_id.clone(),
            author_id: self.session.uid().clone(),
            display_name: profile
                .as_ref()
                .map(|p| p.comment_name())
                .unwrap_or_else(|| "Anonymous".to_string()),
            photo_ref: None,
            text: text.to_string(),
            created_at: None,
        };

        if catch_id.is_local() {
            let comment = CommentRecord {
                created_at: Some(Timestamp::now_millis()),
                ..comment
            };
            let count = self.ctx.cache.append_comment(&comment)?;
            tracing::info!(catch_id = %catch_id, comment_id = %comment.id, ?count, "comment stored locally");
            return Ok(Some(comment));
        }

        let mut doc = codec::encode(&comment).map_err(|e| SyncError::IrrecoverableFailure(e.to_string()))?;
        doc.insert("createdAt".into(), server_timestamp());

        let remote = self.ctx.remote.clone();
        let comment_path = DocPath::comment(catch_id, &comment.id);
        let catch_path = DocPath::catch(catch_id);
        let outcome = guarded_write(
            "comment.post",
            async move {
                remote.create(&comment_path, doc).await?;
                let counted = remote
                    .update(&catch_path, vec![("commentsCount".into(), FieldOp::Increment(1))])
                    .await;
                if let Err(e) = counted {
                    if let Err(undo) = remote.delete(&comment_path).await {
                        tracing::warn!(path = %comment_path, error = %undo, "could not remove comment after failed count");
                    }
                    return Err(e);
                }
                Ok(())
            },
            self.ctx.config.write_deadline,
            OnTimeout::Abandon,
        )
        .await;

        match outcome.into_result() {
            Ok(()) => {
                tracing::info!(catch_id = %catch_id, comment_id = %comment.id, "comment posted");
                Ok(Some(CommentRecord {
                    created_at: Some(Timestamp::now_millis()),
                    ..comment
                }))
            }
            Err(e) => {
                tracing::warn!(catch_id = %catch_id, error = %e, "comment post failed");
                Ok(None)
            }
        }
    }

    /// Delete a comment. Only its author or an admin may.
    ///
    /// Returns whether a comment was removed; remote failures are logged and
    /// reported as `false`, and a comment whose count update failed is put back.
    pub async fn delete(&self, comment: &CommentRecord) -> Result<bool> {
        if &comment.author_id != self.session.uid() && !self.session.is_admin() {
            return Err(SyncError::NotPermitted("only the author or an admin can delete a comment"));
        }
        let catch_id = &comment.catch_id;
        if catch_id.is_placeholder() {
            return Ok(false);
        }
        if catch_id.is_local() {
            return self.ctx.cache.remove_comment(catch_id, &comment.id);
        }

        let remote = self.ctx.remote.clone();
        let comment_path = DocPath::comment(catch_id, &comment.id);
        let catch_path = DocPath::catch(catch_id);
        let outcome = guarded_write(
            "comment.delete",
            async move {
                let Some(existing) = remote.get(&comment_path).await? else {
                    return Ok(false);
                };
                remote.delete(&comment_path).await?;
                let counted = remote
                    .update(&catch_path, vec![("commentsCount".into(), FieldOp::Increment(-1))])
                    .await;
                if let Err(e) = counted {
                    if let Err(undo) = remote.set(&comment_path, existing).await {
                        tracing::warn!(path = %comment_path, error = %undo, "could not restore comment after failed count");
                    }
                    return Err(e);
                }
                Ok::<_, RemoteError>(true)
            },
            self.ctx.config.write_deadline,
            OnTimeout::Abandon,
        )
        .await;

        match outcome.into_result() {
            Ok(removed) => Ok(removed),
            Err(e) => {
                tracing::warn!(catch_id = %catch_id, comment_id = %comment.id, error = %e, "comment delete failed");
                Ok(false)
            }
        }
    }
}
