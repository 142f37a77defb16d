//! Saving and managing the signed-in user's catches.

use std::sync::Arc;

use fangst_shared::{CatchId, CatchRecord, NewCatch, Timestamp};

use crate::context::SyncContext;
use crate::error::{RemoteError, Result, SyncError};
use crate::guard::{guarded_write, OnTimeout, WriteOutcome};
use crate::reconcile::reconcile;
use crate::remote::{codec, server_timestamp, DocPath, FieldOp, Query};
use crate::session::ProfileSession;

/// Where a saved catch ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Remote(CatchId),
    /// The remote write timed out or failed; the catch lives in the local
    /// cache under a `local-` id.
    Local(CatchId),
}

impl SaveOutcome {
    pub fn id(&self) -> &CatchId {
        match self {
            SaveOutcome::Remote(id) | SaveOutcome::Local(id) => id,
        }
    }
}

#[derive(Clone)]
pub struct CatchService {
    ctx: SyncContext,
    session: Arc<ProfileSession>,
}

impl CatchService {
    pub fn new(ctx: SyncContext, session: Arc<ProfileSession>) -> Self {
        Self { ctx, session }
    }

    /// Save a new catch, falling back to the local cache.
    ///
    /// The remote attempt and the fallback share one uuid (`<uuid>` and
    /// `local-<uuid>`). A timed-out remote write is cancelled, so the catch
    /// is never stored twice.
    pub async fn save_catch(&self, new: NewCatch) -> Result<SaveOutcome> {
        new.validate()?;

        let id = CatchId::new_remote();
        let mut doc = codec::encode(&new.clone().into_record(id.clone(), None))
            .map_err(|e| SyncError::IrrecoverableFailure(e.to_string()))?;
        doc.insert("createdAt".into(), server_timestamp());

        let remote = self.ctx.remote.clone();
        let path = DocPath::catch(&id);
        let outcome = guarded_write(
            "catch.save",
            async move { remote.create(&path, doc).await },
            self.ctx.config.catch_save_deadline,
            OnTimeout::Cancel,
        )
        .await;

        if let WriteOutcome::Confirmed(()) = outcome {
            tracing::info!(catch_id = %id, "catch saved");
            return Ok(SaveOutcome::Remote(id));
        }

        let local = new.into_record(id.to_local(), Some(Timestamp::now_millis()));
        match self.ctx.cache.append_catch(&local) {
            Ok(()) => {
                tracing::info!(catch_id = %local.id, "catch saved locally");
                Ok(SaveOutcome::Local(local.id))
            }
            Err(e) => {
                tracing::error!(catch_id = %id, error = %e, "catch could not be saved anywhere");
                Err(SyncError::IrrecoverableFailure(e.to_string()))
            }
        }
    }

    /// The signed-in user's catches, remote and local, newest first. When the
    /// remote read fails only the local ones are returned.
    pub async fn my_catches(&self) -> Result<Vec<CatchRecord>> {
        let uid = self.session.uid().clone();
        let query = Query::collection(fangst_shared::constants::CATCHES_COLLECTION)
            .where_eq("ownerId", uid.as_str());

        let remote = match tokio::time::timeout(
            self.ctx.config.feed_deadline,
            self.ctx.remote.query(&query),
        )
        .await
        {
            Ok(Ok(snapshot)) => codec::decode_all(snapshot),
            Ok(Err(e)) => {
                tracing::warn!(%uid, error = %e, "own catches unavailable remotely");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(%uid, "own catches query timed out");
                Vec::new()
            }
        };

        let local = self
            .ctx
            .cache
            .catches()?
            .into_iter()
            .filter(|c| c.owner_id == uid)
            .collect();
        Ok(reconcile(remote, local))
    }

    /// Locally cached catches that never reached the remote store.
    pub fn pending_local(&self) -> Result<Vec<CatchRecord>> {
        self.ctx.cache.catches()
    }

    pub async fn set_visibility(&self, id: &CatchId, is_public: bool) -> Result<()> {
        if id.is_placeholder() {
            return Err(SyncError::NotPermitted("placeholder catches are read-only"));
        }
        if id.is_local() {
            self.owned_local(id)?;
            self.ctx.cache.set_catch_visibility(id, is_public)?;
            return Ok(());
        }

        let remote = self.ctx.remote.clone();
        let path = DocPath::catch(id);
        let ops = vec![("isPublic".to_string(), FieldOp::Set(is_public.into()))];
        guarded_write(
            "catch.visibility",
            async move { remote.update(&path, ops).await },
            self.ctx.config.write_deadline,
            OnTimeout::Cancel,
        )
        .await
        .into_result()?;
        tracing::info!(catch_id = %id, is_public, "catch visibility changed");
        Ok(())
    }

    pub async fn delete_catch(&self, id: &CatchId) -> Result<()> {
        if id.is_placeholder() {
            return Err(SyncError::NotPermitted("placeholder catches are read-only"));
        }
        if id.is_local() {
            self.owned_local(id)?;
            self.ctx.cache.remove_catch(id)?;
            tracing::info!(catch_id = %id, "local catch deleted");
            return Ok(());
        }

        let remote = self.ctx.remote.clone();
        let path = DocPath::catch(id);
        let owner = self.session.uid().clone();
        guarded_write(
            "catch.delete",
            async move {
                if let Some(doc) = remote.get(&path).await? {
                    if doc.get("ownerId").and_then(|v| v.as_str()) != Some(owner.as_str()) {
                        return Err(RemoteError::PermissionDenied(path.to_string()));
                    }
                }
                remote.delete(&path).await
            },
            self.ctx.config.write_deadline,
            OnTimeout::Cancel,
        )
        .await
        .into_result()?;
        tracing::info!(catch_id = %id, "catch deleted");
        Ok(())
    }

    fn owned_local(&self, id: &CatchId) -> Result<CatchRecord> {
        match self.ctx.cache.catch(id)? {
            Some(record) if &record.owner_id == self.session.uid() => Ok(record),
            Some(_) => Err(SyncError::NotPermitted("only the owner can change a catch")),
            None => Err(SyncError::IrrecoverableFailure(format!("catch {id} not found"))),
        }
    }
}
