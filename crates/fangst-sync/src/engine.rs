//! Wiring for a signed-in user.

use std::sync::Arc;

use fangst_shared::UserId;

use crate::admin::AdminService;
use crate::ai::{ChatAssistant, Classifier, SpotFinder};
use crate::catches::CatchService;
use crate::comments::CommentService;
use crate::context::SyncContext;
use crate::entitlements::EntitlementService;
use crate::feed::CommunityFeed;
use crate::likes::LikeController;
use crate::metered::MeteredService;
use crate::payment::PaymentGateway;
use crate::session::ProfileSession;

/// External services besides the remote store.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn Classifier>,
    pub assistant: Arc<dyn ChatAssistant>,
    pub payment: Arc<dyn PaymentGateway>,
    pub spots: Arc<dyn SpotFinder>,
}

/// Every engine service for one signed-in user.
pub struct SyncEngine {
    pub session: Arc<ProfileSession>,
    pub catches: CatchService,
    pub feed: CommunityFeed,
    pub likes: LikeController,
    pub comments: CommentService,
    pub metered: MeteredService,
    pub entitlements: EntitlementService,
    pub admin: AdminService,
}

impl SyncEngine {
    /// Bootstrap the profile for `uid` and build the services around it.
    pub async fn sign_in(
        ctx: SyncContext,
        collaborators: Collaborators,
        uid: UserId,
        email: Option<String>,
        display_name: Option<String>,
    ) -> Self {
        tracing::info!(%uid, "signing in");
        let session = Arc::new(
            ProfileSession::start(ctx.remote.clone(), &ctx.config, uid, email, display_name).await,
        );

        Self {
            catches: CatchService::new(ctx.clone(), session.clone()),
            feed: CommunityFeed::new(ctx.clone()),
            likes: LikeController::new(ctx.clone(), session.clone()),
            comments: CommentService::new(ctx.clone(), session.clone()),
            metered: MeteredService::new(
                session.clone(),
                collaborators.classifier,
                collaborators.assistant,
                collaborators.spots,
            ),
            entitlements: EntitlementService::new(session.clone(), collaborators.payment),
            admin: AdminService::new(ctx, session.clone()),
            session,
        }
    }
}
