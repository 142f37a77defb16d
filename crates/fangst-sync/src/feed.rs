//! The community feed: public catches, live.
//!
//! The feed listens to the remote public-catch query and to the local cache,
//! and republishes the reconciled view whenever either changes. If the
//! first remote snapshot does not arrive within the feed deadline, or the
//! subscription fails, the degraded view (local catches plus placeholders) is
//! published instead; a later remote snapshot replaces it. An empty feed
//! shows the placeholders too, without being marked degraded.

use fangst_shared::constants::CATCHES_COLLECTION;
use fangst_shared::CatchRecord;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::LocalCache;
use crate::context::SyncContext;
use crate::reconcile::{degraded_view, placeholders, reconcile};
use crate::remote::{codec, Direction, Query, Snapshot};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedView {
    pub catches: Vec<CatchRecord>,
    /// Remote data unavailable; `catches` is local records plus placeholders.
    pub degraded: bool,
}

#[derive(Clone)]
pub struct CommunityFeed {
    ctx: SyncContext,
}

impl CommunityFeed {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    fn query(&self) -> Query {
        Query::collection(CATCHES_COLLECTION)
            .where_eq("isPublic", true)
            .order_by("createdAt", Direction::Descending)
            .limit(self.ctx.config.feed_limit)
    }

    /// One-shot read of the feed.
    pub async fn load(&self) -> FeedView {
        let query = self.query();
        let remote = match tokio::time::timeout(
            self.ctx.config.feed_deadline,
            self.ctx.remote.query(&query),
        )
        .await
        {
            Ok(Ok(snapshot)) => Some(decode(snapshot)),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "feed read failed, showing degraded view");
                None
            }
            Err(_) => {
                tracing::warn!("feed read timed out, showing degraded view");
                None
            }
        };
        build_view(&self.ctx.cache, remote.as_deref())
    }

    /// Start a live feed. Dropping the handle stops it.
    pub fn subscribe(&self) -> FeedHandle {
        let (tx, rx) = watch::channel(FeedView::default());
        let task = tokio::spawn(run_feed(self.ctx.clone(), self.query(), tx));
        FeedHandle { rx, task }
    }
}

pub struct FeedHandle {
    rx: watch::Receiver<FeedView>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub fn current(&self) -> FeedView {
        self.rx.borrow().clone()
    }

    pub fn receiver(&self) -> watch::Receiver<FeedView> {
        self.rx.clone()
    }

    /// Wait for the next published view.
    pub async fn next(&mut self) -> Option<FeedView> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn decode(snapshot: Snapshot) -> Vec<CatchRecord> {
    codec::decode_all(snapshot)
}

fn local_public(cache: &LocalCache) -> Vec<CatchRecord> {
    match cache.catches() {
        Ok(catches) => catches.into_iter().filter(|c| c.is_public).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "local cache unreadable, feed shows remote only");
            Vec::new()
        }
    }
}

fn build_view(cache: &LocalCache, remote: Option<&[CatchRecord]>) -> FeedView {
    let local = local_public(cache);
    match remote {
        Some(remote) => {
            let mut catches = reconcile(remote.to_vec(), local);
            if catches.is_empty() {
                catches = placeholders();
            }
            FeedView {
                catches,
                degraded: false,
            }
        }
        None => FeedView {
            catches: degraded_view(local),
            degraded: true,
        },
    }
}

async fn run_feed(ctx: SyncContext, query: Query, tx: watch::Sender<FeedView>) {
    let mut subscription = ctx.remote.subscribe_query(query);
    let mut local_changes = ctx.cache.changes();

    let mut remote = match tokio::time::timeout(ctx.config.feed_deadline, subscription.next()).await {
        Ok(Some(Ok(snapshot))) => Some(decode(snapshot)),
        Ok(Some(Err(e))) => {
            tracing::warn!(error = %e, "feed subscription failed, showing degraded view");
            None
        }
        Ok(None) => None,
        Err(_) => {
            tracing::warn!(
                deadline_ms = ctx.config.feed_deadline.as_millis() as u64,
                "first feed snapshot late, showing degraded view"
            );
            None
        }
    };
    tx.send_replace(build_view(&ctx.cache, remote.as_deref()));

    let mut live = true;
    loop {
        tokio::select! {
            event = subscription.next(), if live => match event {
                Some(Ok(snapshot)) => remote = Some(decode(snapshot)),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "feed subscription error, showing degraded view");
                    remote = None;
                }
                None => {
                    tracing::debug!("feed subscription closed");
                    live = false;
                    remote = None;
                }
            },
            changed = local_changes.changed() => {
                if changed.is_err() {
                    break;
                }
                tracing::debug!("local cache changed, refreshing feed");
            }
        }
        tx.send_replace(build_view(&ctx.cache, remote.as_deref()));
    }
}
