//! Quota-metered AI actions.
//!
//! Each call passes the entitlement gate before any network traffic. A denial
//! is returned as [`SyncError::AuthorizationDenied`] so the caller can route
//! to the upgrade flow or show the quota notice. Quota is consumed only when
//! the service call succeeds, and never by spot search.

use std::sync::Arc;

use fangst_shared::{AiResult, Decision, MeteredAction, ValidationError};

use crate::ai::{recent_history, ChatAssistant, ChatTurn, Classifier, FishingSpot, SpotFinder};
use crate::error::{Result, SyncError};
use crate::session::ProfileSession;

#[derive(Clone)]
pub struct MeteredService {
    session: Arc<ProfileSession>,
    classifier: Arc<dyn Classifier>,
    assistant: Arc<dyn ChatAssistant>,
    spots: Arc<dyn SpotFinder>,
}

impl MeteredService {
    pub fn new(
        session: Arc<ProfileSession>,
        classifier: Arc<dyn Classifier>,
        assistant: Arc<dyn ChatAssistant>,
        spots: Arc<dyn SpotFinder>,
    ) -> Self {
        Self {
            session,
            classifier,
            assistant,
            spots,
        }
    }

    pub async fn identify(&self, image_ref: &str) -> Result<AiResult> {
        if image_ref.trim().is_empty() {
            return Err(ValidationError::MissingField("imageRef").into());
        }
        let reservation = self
            .session
            .reserve(MeteredAction::Identify)
            .map_err(SyncError::AuthorizationDenied)?;

        let result = self.classifier.classify(image_ref).await?;
        result.validate()?;
        reservation.consume();
        tracing::info!(species = %result.species_name, "catch identified");
        Ok(result)
    }

    /// Ask the assistant. Only the most recent turns of `history` are sent.
    pub async fn chat(&self, message: &str, history: &[ChatTurn]) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::Blank("message").into());
        }
        let reservation = self
            .session
            .reserve(MeteredAction::Chat)
            .map_err(SyncError::AuthorizationDenied)?;

        let reply = self.assistant.reply(message, recent_history(history)).await?;
        reservation.consume();
        Ok(reply)
    }

    /// Suggest spots for `species`, optionally near `area`. Requires premium
    /// and remaining quota but does not use any.
    pub async fn find_spots(&self, species: &str, area: &str) -> Result<Vec<FishingSpot>> {
        let species = species.trim();
        if species.is_empty() {
            return Err(ValidationError::MissingField("species").into());
        }
        if let Decision::Denied(denial) = self.session.authorize(MeteredAction::Spots) {
            tracing::info!(?denial, "spot search denied");
            return Err(SyncError::AuthorizationDenied(denial));
        }

        let spots = self.spots.find_spots(species, area.trim()).await?;
        tracing::debug!(species, found = spots.len(), "spot search finished");
        Ok(spots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockSpotFinder;
    use crate::config::SyncConfig;
    use crate::error::RemoteError;
    use crate::remote::{codec, DocPath, MemoryRemoteStore, RemoteStore};
    use async_trait::async_trait;
    use fangst_shared::{Denial, Edibility, PremiumType, UserProfile};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeClassifier {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        async fn classify(&self, _image_ref: &str) -> std::result::Result<AiResult, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RemoteError::Unavailable("model overloaded".into()));
            }
            Ok(AiResult {
                species_name: "Abborre".into(),
                latin_name: "Perca fluviatilis".into(),
                confidence: Some(0.93),
                description: String::new(),
                edible: Edibility::Yes,
                edible_notes: String::new(),
                recipe_title: String::new(),
                recipe_ingredients: Vec::new(),
                recipe_steps: Vec::new(),
                cooking_method: String::new(),
            })
        }
    }

    #[derive(Default)]
    struct EchoAssistant {
        seen_history: Mutex<usize>,
    }

    #[async_trait]
    impl ChatAssistant for EchoAssistant {
        async fn reply(&self, message: &str, history: &[ChatTurn]) -> std::result::Result<String, RemoteError> {
            *self.seen_history.lock().unwrap() = history.len();
            Ok(format!("echo: {message}"))
        }
    }

    async fn setup(
        is_premium: bool,
        used: u32,
        total: u32,
        classifier: Arc<FakeClassifier>,
    ) -> (MemoryRemoteStore, Arc<ProfileSession>, MeteredService, Arc<EchoAssistant>) {
        let store = MemoryRemoteStore::new();
        let mut profile = UserProfile::new_default("u1".into(), None, None);
        profile.is_premium = is_premium;
        profile.premium_type = if is_premium { PremiumType::Lifetime } else { PremiumType::None };
        profile.ai_quota_used = used;
        profile.ai_quota_total = total;
        store.seed(&DocPath::user(&"u1".into()), codec::encode(&profile).unwrap());

        let remote: Arc<dyn RemoteStore> = Arc::new(store.clone());
        let session = Arc::new(
            ProfileSession::start(remote, &SyncConfig::default(), "u1".into(), None, None).await,
        );
        let assistant = Arc::new(EchoAssistant::default());
        let svc = MeteredService::new(session.clone(), classifier, assistant.clone(), Arc::new(MockSpotFinder));
        (store, session, svc, assistant)
    }

    #[tokio::test]
    async fn non_premium_identify_makes_no_call() {
        let classifier = Arc::new(FakeClassifier::default());
        let (_store, _session, svc, _) = setup(false, 0, 500, classifier.clone()).await;
        let err = svc.identify("blob:1").await.unwrap_err();
        assert!(matches!(err, SyncError::AuthorizationDenied(Denial::NotPremium)));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_quota_is_denied() {
        let classifier = Arc::new(FakeClassifier::default());
        let (_store, _session, svc, _) = setup(true, 500, 500, classifier.clone()).await;
        let err = svc.identify("blob:1").await.unwrap_err();
        assert!(matches!(err, SyncError::AuthorizationDenied(Denial::QuotaExhausted)));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_identify_consumes_one_unit() {
        let classifier = Arc::new(FakeClassifier::default());
        let (_store, session, svc, _) = setup(true, 10, 500, classifier).await;
        let result = svc.identify("blob:1").await.unwrap();
        assert_eq!(result.species_name, "Abborre");
        assert_eq!(session.profile().unwrap().ai_quota_used, 11);
    }

    #[tokio::test]
    async fn failed_identify_keeps_quota() {
        let classifier = Arc::new(FakeClassifier {
            fail: true,
            ..FakeClassifier::default()
        });
        let (_store, session, svc, _) = setup(true, 10, 500, classifier).await;
        let err = svc.identify("blob:1").await.unwrap_err();
        assert!(matches!(err, SyncError::TransientRemoteFailure(_)));
        assert_eq!(session.profile().unwrap().ai_quota_used, 10);
        assert!(session.authorize(MeteredAction::Identify).is_allowed());
    }

    #[tokio::test]
    async fn chat_sends_trimmed_history_and_consumes() {
        let classifier = Arc::new(FakeClassifier::default());
        let (_store, session, svc, assistant) = setup(true, 0, 500, classifier).await;
        let history: Vec<ChatTurn> = (0..25).map(|i| ChatTurn::user(format!("q{i}"))).collect();
        let reply = svc.chat(" Var nappar gösen? ", &history).await.unwrap();
        assert_eq!(reply, "echo: Var nappar gösen?");
        assert_eq!(*assistant.seen_history.lock().unwrap(), 10);
        assert_eq!(session.profile().unwrap().ai_quota_used, 1);
    }

    #[tokio::test]
    async fn blank_chat_message_is_rejected() {
        let classifier = Arc::new(FakeClassifier::default());
        let (_store, session, svc, _) = setup(true, 0, 500, classifier).await;
        assert!(matches!(
            svc.chat("  ", &[]).await,
            Err(SyncError::ValidationFailure(_))
        ));
        assert_eq!(session.profile().unwrap().ai_quota_used, 0);
    }

    #[tokio::test]
    async fn spot_search_is_gated_but_free() {
        let classifier = Arc::new(FakeClassifier::default());
        let (_store, session, svc, _) = setup(true, 20, 500, classifier).await;
        let spots = svc.find_spots("Gös", "Vättern").await.unwrap();
        assert_eq!(spots.len(), 3);
        assert_eq!(session.profile().unwrap().ai_quota_used, 20);
    }

    #[tokio::test]
    async fn spot_search_needs_premium_and_quota() {
        let classifier = Arc::new(FakeClassifier::default());
        let (_store, _session, svc, _) = setup(false, 0, 500, classifier.clone()).await;
        assert!(matches!(
            svc.find_spots("Gös", "").await,
            Err(SyncError::AuthorizationDenied(Denial::NotPremium))
        ));

        let (_store, _session, svc, _) = setup(true, 500, 500, classifier).await;
        assert!(matches!(
            svc.find_spots("Gös", "").await,
            Err(SyncError::AuthorizationDenied(Denial::QuotaExhausted))
        ));
        assert!(matches!(
            svc.find_spots("  ", "").await,
            Err(SyncError::ValidationFailure(_))
        ));
    }
}
