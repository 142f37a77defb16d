//! Promo-code redemption and checkout.

use std::sync::Arc;

use chrono::Utc;

use fangst_shared::entitlement::{normalize_code, redeem_code};
use fangst_shared::EntitlementGrant;

use crate::error::Result;
use crate::payment::{CheckoutOutcome, PaymentGateway};
use crate::session::ProfileSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoOutcome {
    Granted(EntitlementGrant),
    /// The code matched nothing; nothing changed.
    InvalidCode,
}

#[derive(Clone)]
pub struct EntitlementService {
    session: Arc<ProfileSession>,
    payment: Arc<dyn PaymentGateway>,
}

impl EntitlementService {
    pub fn new(session: Arc<ProfileSession>, payment: Arc<dyn PaymentGateway>) -> Self {
        Self { session, payment }
    }

    pub async fn redeem_promo(&self, code: &str) -> Result<PromoOutcome> {
        let Some(grant) = redeem_code(code, Utc::now()) else {
            tracing::info!(code = %normalize_code(code), "invalid promo code");
            return Ok(PromoOutcome::InvalidCode);
        };
        self.session.write_grant(&grant).await?;
        Ok(PromoOutcome::Granted(grant))
    }

    /// Start checkout. A direct grant from the gateway is written to the
    /// profile before returning; a redirect is handed back untouched.
    pub async fn checkout(&self) -> Result<CheckoutOutcome> {
        let email = self.session.profile().and_then(|p| p.email);
        let outcome = self.payment.checkout(self.session.uid(), email.as_deref()).await?;
        if let CheckoutOutcome::Granted(grant) = &outcome {
            self.session.write_grant(grant).await?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::{RemoteError, SyncError};
    use crate::payment::MockPaymentGateway;
    use crate::remote::{MemoryRemoteStore, RemoteStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use fangst_shared::{MeteredAction, PremiumType, UserId};

    struct RedirectGateway;

    #[async_trait]
    impl PaymentGateway for RedirectGateway {
        async fn checkout(
            &self,
            uid: &UserId,
            _email: Option<&str>,
        ) -> std::result::Result<CheckoutOutcome, RemoteError> {
            Ok(CheckoutOutcome::Redirect(format!("https://pay.example/{uid}")))
        }
    }

    async fn service(
        store: &MemoryRemoteStore,
        payment: Arc<dyn PaymentGateway>,
    ) -> (Arc<ProfileSession>, EntitlementService) {
        let remote: Arc<dyn RemoteStore> = Arc::new(store.clone());
        let session = Arc::new(
            ProfileSession::start(remote, &SyncConfig::default(), "u1".into(), None, None).await,
        );
        (session.clone(), EntitlementService::new(session, payment))
    }

    #[tokio::test]
    async fn promo_code_grants_trial() {
        let store = MemoryRemoteStore::new();
        let (session, svc) = service(&store, Arc::new(MockPaymentGateway)).await;
        let before = Utc::now();

        let PromoOutcome::Granted(grant) = svc.redeem_promo("  fiske2026 ").await.unwrap() else {
            panic!("expected a grant");
        };
        assert_eq!(grant.premium_type, PremiumType::Trial);
        assert_eq!(grant.ai_quota_total, 50);
        let expires = grant.expires_at.unwrap();
        assert!(expires >= before + Duration::days(7));
        assert!(expires <= Utc::now() + Duration::days(7));

        let profile = session.profile().unwrap();
        assert_eq!(profile.premium_type, PremiumType::Trial);
        assert!(session.authorize(MeteredAction::Identify).is_allowed());
    }

    #[tokio::test]
    async fn invalid_code_changes_nothing() {
        let store = MemoryRemoteStore::new();
        let (session, svc) = service(&store, Arc::new(MockPaymentGateway)).await;
        let writes = store.write_count();
        assert_eq!(svc.redeem_promo("GRATIS").await.unwrap(), PromoOutcome::InvalidCode);
        assert_eq!(store.write_count(), writes);
        assert!(!session.profile().unwrap().is_premium);
    }

    #[tokio::test]
    async fn offline_redeem_reports_transient_failure() {
        let store = MemoryRemoteStore::new();
        let (session, svc) = service(&store, Arc::new(MockPaymentGateway)).await;
        store.set_offline(true);
        let err = svc.redeem_promo("FISKE2026").await.unwrap_err();
        assert!(matches!(err, SyncError::TransientRemoteFailure(_)));
        assert!(!session.profile().unwrap().is_premium);
    }

    #[tokio::test]
    async fn mock_checkout_grants_lifetime() {
        let store = MemoryRemoteStore::new();
        let (session, svc) = service(&store, Arc::new(MockPaymentGateway)).await;
        let outcome = svc.checkout().await.unwrap();
        assert_eq!(outcome, CheckoutOutcome::Granted(EntitlementGrant::lifetime()));
        let profile = session.profile().unwrap();
        assert_eq!(profile.premium_type, PremiumType::Lifetime);
        assert_eq!(profile.ai_quota_total, 500);
    }

    #[tokio::test]
    async fn redirect_checkout_leaves_profile_alone() {
        let store = MemoryRemoteStore::new();
        let (session, svc) = service(&store, Arc::new(RedirectGateway)).await;
        let outcome = svc.checkout().await.unwrap();
        assert_eq!(outcome, CheckoutOutcome::Redirect("https://pay.example/u1".into()));
        assert!(!session.profile().unwrap().is_premium);
    }
}
