//! The signed-in user's profile.
//!
//! [`ProfileSession`] owns the only writable copy of the profile. A background
//! task feeds it from the live `users/{uid}` document; the session itself
//! applies optimistic quota consumption and confirmed entitlement grants.
//! Everything else reads it, or subscribes for changes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use fangst_shared::entitlement::authorize_with_reserved;
use fangst_shared::{Decision, Denial, EntitlementGrant, MeteredAction, Timestamp, UserId, UserProfile};

use crate::config::{QuotaPolicy, SyncConfig};
use crate::error::{Result, SyncError};
use crate::guard::{guarded_write, spawn_detached, OnTimeout, WriteOutcome};
use crate::remote::{codec, server_timestamp, DocPath, FieldOp, RemoteStore, Subscription};

pub struct ProfileSession {
    uid: UserId,
    remote: Arc<dyn RemoteStore>,
    policy: QuotaPolicy,
    deadline: Duration,
    cell: Arc<watch::Sender<Option<UserProfile>>>,
    in_flight: Mutex<u32>,
    pump: JoinHandle<()>,
}

impl ProfileSession {
    /// Load or create the profile for `uid`, then keep it live.
    ///
    /// A first sign-in writes the default profile with the long deadline. If
    /// that write times out the session continues with the default profile
    /// visible locally; the write may still land.
    pub async fn start(
        remote: Arc<dyn RemoteStore>,
        config: &SyncConfig,
        uid: UserId,
        email: Option<String>,
        display_name: Option<String>,
    ) -> Self {
        let (cell, _) = watch::channel(None);
        let cell = Arc::new(cell);

        bootstrap(&remote, &cell, config.profile_deadline, &uid, email, display_name).await;

        let subscription = remote.subscribe_doc(DocPath::user(&uid));
        let pump = spawn_pump(cell.clone(), subscription, uid.clone());

        Self {
            uid,
            remote,
            policy: config.quota_policy,
            deadline: config.profile_deadline,
            cell,
            in_flight: Mutex::new(0),
            pump,
        }
    }

    pub fn uid(&self) -> &UserId {
        &self.uid
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.cell.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserProfile>> {
        self.cell.subscribe()
    }

    pub fn is_admin(&self) -> bool {
        self.cell.borrow().as_ref().is_some_and(UserProfile::is_admin)
    }

    /// Quota left for display, `0` without a profile.
    pub fn remaining_quota(&self) -> u32 {
        self.cell.borrow().as_ref().map_or(0, UserProfile::remaining_quota)
    }

    pub fn quota_policy(&self) -> QuotaPolicy {
        self.policy
    }

    fn in_flight(&self) -> MutexGuard<'_, u32> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluate the gate without reserving anything.
    pub fn authorize(&self, action: MeteredAction) -> Decision {
        let reserved = match self.policy {
            QuotaPolicy::Hard => *self.in_flight(),
            QuotaPolicy::Soft => 0,
        };
        self.decide(action, reserved)
    }

    fn decide(&self, action: MeteredAction, reserved: u32) -> Decision {
        match self.cell.borrow().as_ref() {
            Some(profile) => authorize_with_reserved(profile, action, reserved),
            None => Decision::Denied(Denial::NotPremium),
        }
    }

    /// Pass the gate and hold one unit of quota for the duration of a metered
    /// call. Under the hard policy the held unit counts as used until the
    /// reservation is consumed or dropped.
    pub fn reserve(&self, action: MeteredAction) -> std::result::Result<QuotaReservation<'_>, Denial> {
        let mut in_flight = self.in_flight();
        let reserved = match self.policy {
            QuotaPolicy::Hard => *in_flight,
            QuotaPolicy::Soft => 0,
        };
        match self.decide(action, reserved) {
            Decision::Allowed => {
                if self.policy == QuotaPolicy::Hard {
                    *in_flight += 1;
                }
                Ok(QuotaReservation {
                    session: self,
                    action,
                    settled: false,
                })
            }
            Decision::Denied(denial) => {
                tracing::info!(uid = %self.uid, ?action, %denial, "metered action denied");
                Err(denial)
            }
        }
    }

    fn release(&self) {
        if self.policy == QuotaPolicy::Hard {
            let mut in_flight = self.in_flight();
            *in_flight = in_flight.saturating_sub(1);
        }
    }

    /// Count one unit as used: visible immediately, remote increment in the
    /// background.
    fn consume(&self, action: MeteredAction) {
        let clamp = self.policy == QuotaPolicy::Hard;
        {
            let mut in_flight = self.in_flight();
            if clamp {
                *in_flight = in_flight.saturating_sub(1);
            }
            self.cell.send_modify(|profile| {
                if let Some(profile) = profile {
                    profile.ai_quota_used = profile.ai_quota_used.saturating_add(1);
                    if clamp {
                        profile.ai_quota_used = profile.ai_quota_used.min(profile.ai_quota_total);
                    }
                }
            });
        }

        tracing::debug!(uid = %self.uid, ?action, "quota unit consumed");
        let remote = self.remote.clone();
        let path = DocPath::user(&self.uid);
        spawn_detached("profile.quota", async move {
            remote
                .update(&path, vec![("aiQuotaUsed".into(), FieldOp::Increment(1))])
                .await
        });
    }

    /// Write an entitlement grant to the profile through the long-deadline
    /// guarded write. The local profile only changes once the write is
    /// confirmed.
    pub async fn write_grant(&self, grant: &EntitlementGrant) -> Result<()> {
        let expires = match grant.expires_at {
            Some(at) => field(&Timestamp::from_datetime(at))?,
            None => FieldOp::Delete,
        };
        let ops = vec![
            ("isPremium".to_string(), FieldOp::Set(true.into())),
            ("premiumType".to_string(), field(&grant.premium_type)?),
            ("aiQuotaTotal".to_string(), FieldOp::Set(grant.ai_quota_total.into())),
            ("premiumExpiresAt".to_string(), expires),
        ];

        let remote = self.remote.clone();
        let path = DocPath::user(&self.uid);
        let outcome = guarded_write(
            "profile.grant",
            async move { remote.update(&path, ops).await },
            self.deadline,
            OnTimeout::Abandon,
        )
        .await;

        match outcome {
            WriteOutcome::Confirmed(()) => {
                self.cell.send_modify(|profile| {
                    if let Some(profile) = profile {
                        profile.apply_grant(grant);
                    }
                });
                tracing::info!(uid = %self.uid, premium_type = ?grant.premium_type, "entitlement granted");
                Ok(())
            }
            WriteOutcome::TimedOut => Err(SyncError::TransientRemoteFailure(
                "entitlement write timed out".into(),
            )),
            WriteOutcome::Failed(e) => Err(e.into()),
        }
    }
}

impl Drop for ProfileSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// One unit of quota held across a metered call.
#[must_use = "a reservation is released when dropped"]
pub struct QuotaReservation<'a> {
    session: &'a ProfileSession,
    action: MeteredAction,
    settled: bool,
}

impl QuotaReservation<'_> {
    /// The metered call succeeded.
    pub fn consume(mut self) {
        self.settled = true;
        self.session.consume(self.action);
    }
}

impl Drop for QuotaReservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.session.release();
        }
    }
}

fn field<T: Serialize>(value: &T) -> Result<FieldOp> {
    serde_json::to_value(value)
        .map(FieldOp::Set)
        .map_err(|e| SyncError::IrrecoverableFailure(e.to_string()))
}

async fn bootstrap(
    remote: &Arc<dyn RemoteStore>,
    cell: &watch::Sender<Option<UserProfile>>,
    deadline: Duration,
    uid: &UserId,
    email: Option<String>,
    display_name: Option<String>,
) {
    let path = DocPath::user(uid);
    match tokio::time::timeout(deadline, remote.get(&path)).await {
        Ok(Ok(Some(doc))) => match codec::decode::<UserProfile>(uid.as_str(), doc) {
            Ok(profile) => {
                cell.send_replace(Some(profile));
            }
            Err(e) => tracing::warn!(%uid, error = %e, "stored profile could not be decoded"),
        },
        Ok(Ok(None)) => create_default(remote, cell, deadline, uid, email, display_name).await,
        Ok(Err(e)) => tracing::warn!(%uid, error = %e, "profile read failed, continuing"),
        Err(_) => tracing::warn!(%uid, deadline_ms = deadline.as_millis() as u64, "profile read timed out, continuing"),
    }
}

async fn create_default(
    remote: &Arc<dyn RemoteStore>,
    cell: &watch::Sender<Option<UserProfile>>,
    deadline: Duration,
    uid: &UserId,
    email: Option<String>,
    display_name: Option<String>,
) {
    let profile = UserProfile::new_default(uid.clone(), email, display_name);
    let mut doc = match codec::encode(&profile) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::error!(%uid, error = %e, "could not encode default profile");
            return;
        }
    };
    doc.insert("createdAt".into(), server_timestamp());

    let remote = remote.clone();
    let path = DocPath::user(uid);
    let outcome = guarded_write(
        "profile.bootstrap",
        async move { remote.create(&path, doc).await },
        deadline,
        OnTimeout::Abandon,
    )
    .await;
    match outcome {
        WriteOutcome::Confirmed(()) => tracing::info!(%uid, "default profile created"),
        WriteOutcome::TimedOut => tracing::warn!(%uid, "profile bootstrap timed out, continuing"),
        WriteOutcome::Failed(e) => tracing::warn!(%uid, error = %e, "profile bootstrap failed, continuing"),
    }

    cell.send_modify(|current| {
        if current.is_none() {
            *current = Some(profile);
        }
    });
}

fn spawn_pump(
    cell: Arc<watch::Sender<Option<UserProfile>>>,
    mut subscription: Subscription,
    uid: UserId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            match event {
                Ok(snapshot) => match snapshot.docs.into_iter().next() {
                    Some((id, doc)) => match codec::decode::<UserProfile>(&id, doc) {
                        Ok(profile) => {
                            cell.send_replace(Some(profile));
                        }
                        Err(e) => tracing::warn!(%uid, error = %e, "ignoring undecodable profile update"),
                    },
                    None => tracing::debug!(%uid, "profile document not present"),
                },
                Err(e) => tracing::warn!(%uid, error = %e, "profile subscription error"),
            }
        }
        tracing::debug!(%uid, "profile subscription closed");
    })
}
