//! Admin console operations.
//!
//! Ban toggles are written, then re-read: the list shown afterwards is what
//! the remote store holds, not an optimistic guess.

use std::sync::Arc;

use fangst_shared::constants::USERS_COLLECTION;
use fangst_shared::{UserId, UserProfile};

use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::guard::{guarded_write, OnTimeout};
use crate::remote::{codec, Direction, DocPath, FieldOp, Query};
use crate::session::ProfileSession;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub total_users: usize,
    pub premium_users: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserOverview {
    /// Newest first.
    pub users: Vec<UserProfile>,
    pub stats: UserStats,
}

#[derive(Clone)]
pub struct AdminService {
    ctx: SyncContext,
    session: Arc<ProfileSession>,
}

impl AdminService {
    pub fn new(ctx: SyncContext, session: Arc<ProfileSession>) -> Self {
        Self { ctx, session }
    }

    fn require_admin(&self) -> Result<()> {
        if self.session.is_admin() {
            Ok(())
        } else {
            Err(SyncError::NotPermitted("admin role required"))
        }
    }

    pub async fn list_users(&self) -> Result<UserOverview> {
        self.require_admin()?;
        let query = Query::collection(USERS_COLLECTION).order_by("createdAt", Direction::Descending);
        let snapshot = self.ctx.remote.query(&query).await?;
        let users: Vec<UserProfile> = codec::decode_all(snapshot);
        let stats = UserStats {
            total_users: users.len(),
            premium_users: users.iter().filter(|u| u.is_premium).count(),
        };
        Ok(UserOverview { users, stats })
    }

    /// Flip `banned` for `uid` and return the refreshed overview.
    pub async fn toggle_ban(&self, uid: &UserId, currently_banned: bool) -> Result<UserOverview> {
        self.require_admin()?;
        let remote = self.ctx.remote.clone();
        let path = DocPath::user(uid);
        let ops = vec![("banned".to_string(), FieldOp::Set((!currently_banned).into()))];
        guarded_write(
            "admin.ban",
            async move { remote.update(&path, ops).await },
            self.ctx.config.write_deadline,
            OnTimeout::Cancel,
        )
        .await
        .into_result()?;
        tracing::info!(admin = %self.session.uid(), %uid, banned = !currently_banned, "ban toggled");
        self.list_users().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::temp_cache;
    use crate::config::SyncConfig;
    use crate::remote::{MemoryRemoteStore, RemoteStore};
    use fangst_shared::{Role, Timestamp};

    fn seed_user(store: &MemoryRemoteStore, uid: &str, role: Role, is_premium: bool, created: i64) {
        let mut profile = UserProfile::new_default(uid.into(), None, None);
        profile.role = role;
        profile.is_premium = is_premium;
        if is_premium {
            profile.premium_type = fangst_shared::PremiumType::Lifetime;
        }
        profile.created_at = Some(Timestamp::Server {
            seconds: created,
            nanoseconds: 0,
        });
        store.seed(&DocPath::user(&uid.into()), codec::encode(&profile).unwrap());
    }

    async fn service_as(store: &MemoryRemoteStore, uid: &str) -> (tempfile::TempDir, AdminService) {
        let (dir, cache) = temp_cache();
        let remote: Arc<dyn RemoteStore> = Arc::new(store.clone());
        let config = SyncConfig::default();
        let session = ProfileSession::start(remote.clone(), &config, uid.into(), None, None).await;
        (dir, AdminService::new(SyncContext::new(remote, cache, config), Arc::new(session)))
    }

    #[tokio::test]
    async fn admin_lists_users_newest_first_with_stats() {
        let store = MemoryRemoteStore::new();
        seed_user(&store, "boss", Role::Admin, false, 1);
        seed_user(&store, "a", Role::User, true, 2);
        seed_user(&store, "b", Role::User, false, 3);
        let (_dir, admin) = service_as(&store, "boss").await;

        let overview = admin.list_users().await.unwrap();
        let uids: Vec<_> = overview.users.iter().map(|u| u.uid.as_str()).collect();
        assert_eq!(uids, vec!["b", "a", "boss"]);
        assert_eq!(overview.stats, UserStats { total_users: 3, premium_users: 1 });
    }

    #[tokio::test]
    async fn ban_toggle_writes_then_refetches() {
        let store = MemoryRemoteStore::new();
        seed_user(&store, "boss", Role::Admin, false, 1);
        seed_user(&store, "troll", Role::User, false, 2);
        let (_dir, admin) = service_as(&store, "boss").await;

        let overview = admin.toggle_ban(&"troll".into(), false).await.unwrap();
        let troll = overview.users.iter().find(|u| u.uid.as_str() == "troll").unwrap();
        assert!(troll.banned);
    }

    #[tokio::test]
    async fn non_admin_is_refused() {
        let store = MemoryRemoteStore::new();
        seed_user(&store, "pleb", Role::User, false, 1);
        let (_dir, svc) = service_as(&store, "pleb").await;
        assert!(matches!(svc.list_users().await, Err(SyncError::NotPermitted(_))));
        assert!(matches!(
            svc.toggle_ban(&"pleb".into(), false).await,
            Err(SyncError::NotPermitted(_))
        ));
    }
}
