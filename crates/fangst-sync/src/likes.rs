//! Likes: optimistic toggle backed by `likes/{catchId}_{uid}` documents.
//!
//! The like document's existence is the source of truth for "has this user
//! liked this catch". The catch's `likesCount` is only ever changed with
//! atomic increments. Local and placeholder catches are liked cosmetically;
//! nothing is written anywhere.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use fangst_shared::{CatchId, CatchRecord, LikeRecord, UserId};

use crate::context::SyncContext;
use crate::error::RemoteError;
use crate::optimistic::OptimisticController;
use crate::remote::{codec, DocPath, FieldOp, RemoteStore};
use crate::session::ProfileSession;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: u32,
}

impl LikeState {
    fn toggle(&mut self) {
        self.liked = !self.liked;
        self.likes_count = if self.liked {
            self.likes_count.saturating_add(1)
        } else {
            self.likes_count.saturating_sub(1)
        };
    }
}

pub struct LikeController {
    ctx: SyncContext,
    session: Arc<ProfileSession>,
    state: Arc<OptimisticController<CatchId, LikeState>>,
    in_flight: Arc<Mutex<HashSet<CatchId>>>,
}

impl LikeController {
    pub fn new(ctx: SyncContext, session: Arc<ProfileSession>) -> Self {
        Self {
            ctx,
            session,
            state: Arc::new(OptimisticController::new()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn state(&self, id: &CatchId) -> Option<LikeState> {
        self.state.get(id)
    }

    pub fn subscribe(&self) -> watch::Receiver<HashMap<CatchId, LikeState>> {
        self.state.subscribe()
    }

    /// Load counts from freshly read catches and look up whether the user
    /// liked each remote one. Catches with a toggle in flight are skipped.
    /// When the lookup fails the previously known `liked` flag is kept.
    pub async fn observe(&self, catches: &[CatchRecord]) {
        let uid = self.session.uid();
        for catch in catches {
            if self.is_in_flight(&catch.id) {
                continue;
            }
            let known = self.state.get(&catch.id).is_some_and(|s| s.liked);
            let liked = if catch.id.is_remote() {
                self.remote_liked(&catch.id, uid).await.unwrap_or(known)
            } else {
                known
            };
            self.state.upsert(
                catch.id.clone(),
                LikeState {
                    liked,
                    likes_count: catch.likes_count,
                },
            );
        }
    }

    async fn remote_liked(&self, id: &CatchId, uid: &UserId) -> Option<bool> {
        match self.ctx.remote.get(&DocPath::like(id, uid)).await {
            Ok(Some(doc)) => Some(codec::decode::<LikeRecord>(&LikeRecord::doc_id(id, uid), doc).is_ok()),
            Ok(None) => Some(false),
            Err(e) => {
                tracing::debug!(catch_id = %id, error = %e, "like lookup failed, keeping known state");
                None
            }
        }
    }

    fn is_in_flight(&self, id: &CatchId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// Toggle the user's like and return the state left visible.
    ///
    /// A tap while the previous toggle on the same catch is still in flight is
    /// ignored. A failed remote write is rolled back and only logged. The
    /// remote write runs on its own task: dropping this future does not cut it
    /// short, and the visible state is settled when it finishes.
    pub async fn toggle(&self, id: &CatchId) -> LikeState {
        let Some(slot) = InFlight::claim(&self.in_flight, id) else {
            return self.state.get(id).unwrap_or_default();
        };

        let pending = self.state.apply(id.clone(), LikeState::toggle);
        let now_liked = self.state.get(id).is_some_and(|s| s.liked);

        if !id.is_remote() {
            tracing::debug!(catch_id = %id, liked = now_liked, "cosmetic like on non-remote catch");
            self.state.commit(pending);
            drop(slot);
            return self.state.get(id).unwrap_or_default();
        }

        let remote = self.ctx.remote.clone();
        let state = self.state.clone();
        let uid = self.session.uid().clone();
        let catch_id = id.clone();
        let task = tokio::spawn(async move {
            let _slot = slot;
            match write_like(remote.as_ref(), &catch_id, &uid, now_liked).await {
                Ok(LikeWrite::Counted) => state.commit(pending),
                Ok(LikeWrite::AlreadyInPlace) => {
                    // The stored count already reflects this user.
                    state.rollback(pending);
                    let mut settled = state.get(&catch_id).unwrap_or_default();
                    settled.liked = now_liked;
                    state.upsert(catch_id.clone(), settled);
                    tracing::debug!(catch_id = %catch_id, liked = now_liked, "like already in place, count unchanged");
                }
                Err(e) => {
                    tracing::warn!(catch_id = %catch_id, error = %e, "like toggle failed, rolled back");
                    state.rollback(pending);
                }
            }
        });
        if let Err(e) = task.await {
            tracing::error!(catch_id = %id, error = %e, "like task did not finish");
        }

        self.state.get(id).unwrap_or_default()
    }
}

/// Marks a catch as having a toggle in flight until dropped.
struct InFlight {
    set: Arc<Mutex<HashSet<CatchId>>>,
    id: CatchId,
}

impl InFlight {
    fn claim(set: &Arc<Mutex<HashSet<CatchId>>>, id: &CatchId) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());
        inserted.then(|| Self {
            set: set.clone(),
            id: id.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeWrite {
    /// The like document changed and the count moved with it.
    Counted,
    /// The like document was already in the requested state.
    AlreadyInPlace,
}

async fn write_like(
    remote: &dyn RemoteStore,
    id: &CatchId,
    uid: &UserId,
    liked: bool,
) -> Result<LikeWrite, RemoteError> {
    let like_path = DocPath::like(id, uid);
    let catch_path = DocPath::catch(id);

    if liked {
        let like_doc = codec::encode(&LikeRecord::new(id.clone(), uid.clone()))?;
        match remote.create(&like_path, like_doc).await {
            Ok(()) => {}
            Err(RemoteError::AlreadyExists(_)) => return Ok(LikeWrite::AlreadyInPlace),
            Err(e) => return Err(e),
        }
        let counted = remote
            .update(&catch_path, vec![("likesCount".into(), FieldOp::Increment(1))])
            .await;
        if let Err(e) = counted {
            if let Err(undo) = remote.delete(&like_path).await {
                tracing::warn!(catch_id = %id, error = %undo, "could not remove like after failed count");
            }
            return Err(e);
        }
    } else {
        let Some(existing) = remote.get(&like_path).await? else {
            return Ok(LikeWrite::AlreadyInPlace);
        };
        remote.delete(&like_path).await?;
        let counted = remote
            .update(&catch_path, vec![("likesCount".into(), FieldOp::Increment(-1))])
            .await;
        if let Err(e) = counted {
            if let Err(undo) = remote.set(&like_path, existing).await {
                tracing::warn!(catch_id = %id, error = %undo, "could not restore like after failed count");
            }
            return Err(e);
        }
    }
    Ok(LikeWrite::Counted)
}
