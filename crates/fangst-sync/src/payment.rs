//! Payment collaborator.

use async_trait::async_trait;

use fangst_shared::{EntitlementGrant, UserId};

use crate::error::RemoteError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Continue at the provider's hosted checkout page.
    Redirect(String),
    /// The provider granted the entitlement directly.
    Granted(EntitlementGrant),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn checkout(&self, uid: &UserId, email: Option<&str>) -> Result<CheckoutOutcome, RemoteError>;
}

/// Gateway used when no payment provider is configured: every checkout
/// grants lifetime premium.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockPaymentGateway;

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn checkout(&self, uid: &UserId, _email: Option<&str>) -> Result<CheckoutOutcome, RemoteError> {
        tracing::info!(%uid, "mock checkout, granting lifetime premium");
        Ok(CheckoutOutcome::Granted(EntitlementGrant::lifetime()))
    }
}
