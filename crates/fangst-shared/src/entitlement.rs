//! Quota/entitlement gate and promo-code grants.
//!
//! [`authorize`] is a UX gate evaluated before any metered remote call. It is
//! not a security boundary; the remote store's access rules are.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{LIFETIME_AI_QUOTA, TRIAL_AI_QUOTA, TRIAL_DAYS};
use crate::records::{PremiumType, UserProfile};

/// Actions behind the premium and quota gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeteredAction {
    Identify,
    Chat,
    /// Spot search: gated like the others, but free of charge.
    Spots,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Denial {
    /// Route the user to the upgrade flow.
    NotPremium,
    /// Blocking notice, no further action.
    QuotaExhausted,
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Denial::NotPremium => f.write_str("premium membership required"),
            Denial::QuotaExhausted => f.write_str("AI quota exhausted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Evaluate the gate: premium first, then quota.
pub fn authorize(profile: &UserProfile, action: MeteredAction) -> Decision {
    authorize_with_reserved(profile, action, 0)
}

/// Same rule, counting `reserved` units that are already in flight on this
/// client as used.
pub fn authorize_with_reserved(
    profile: &UserProfile,
    _action: MeteredAction,
    reserved: u32,
) -> Decision {
    if !profile.is_premium {
        return Decision::Denied(Denial::NotPremium);
    }
    if profile.ai_quota_used.saturating_add(reserved) >= profile.ai_quota_total {
        return Decision::Denied(Denial::QuotaExhausted);
    }
    Decision::Allowed
}

// ---------------------------------------------------------------------------
// Grants
// ---------------------------------------------------------------------------

/// Entitlement written to a profile by a purchase or promo code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementGrant {
    pub premium_type: PremiumType,
    pub ai_quota_total: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl EntitlementGrant {
    pub fn lifetime() -> Self {
        Self {
            premium_type: PremiumType::Lifetime,
            ai_quota_total: LIFETIME_AI_QUOTA,
            expires_at: None,
        }
    }
}

struct PromoCode {
    code: &'static str,
    premium_type: PremiumType,
    ai_quota_total: u32,
    valid_days: Option<i64>,
}

const PROMO_CODES: &[PromoCode] = &[PromoCode {
    code: "FISKE2026",
    premium_type: PremiumType::Trial,
    ai_quota_total: TRIAL_AI_QUOTA,
    valid_days: Some(TRIAL_DAYS),
}];

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Resolve a user-entered promo code to the grant it unlocks, if any.
pub fn redeem_code(code: &str, now: DateTime<Utc>) -> Option<EntitlementGrant> {
    let normalized = normalize_code(code);
    PROMO_CODES
        .iter()
        .find(|promo| promo.code == normalized)
        .map(|promo| EntitlementGrant {
            premium_type: promo.premium_type,
            ai_quota_total: promo.ai_quota_total,
            expires_at: promo.valid_days.map(|days| now + Duration::days(days)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(is_premium: bool, used: u32, total: u32) -> UserProfile {
        let mut p = UserProfile::new_default("u1".into(), None, None);
        p.is_premium = is_premium;
        p.ai_quota_used = used;
        p.ai_quota_total = total;
        p
    }

    #[test]
    fn non_premium_is_denied_regardless_of_quota() {
        for (used, total) in [(0, 500), (500, 500), (900, 10), (0, 0)] {
            assert_eq!(
                authorize(&profile(false, used, total), MeteredAction::Identify),
                Decision::Denied(Denial::NotPremium)
            );
        }
    }

    #[test]
    fn exhausted_quota_is_denied() {
        assert_eq!(
            authorize(&profile(true, 500, 500), MeteredAction::Identify),
            Decision::Denied(Denial::QuotaExhausted)
        );
        assert_eq!(
            authorize(&profile(true, 501, 500), MeteredAction::Chat),
            Decision::Denied(Denial::QuotaExhausted)
        );
    }

    #[test]
    fn spot_search_uses_the_same_rule() {
        assert_eq!(
            authorize(&profile(false, 0, 500), MeteredAction::Spots),
            Decision::Denied(Denial::NotPremium)
        );
        assert!(authorize(&profile(true, 0, 500), MeteredAction::Spots).is_allowed());
    }

    #[test]
    fn premium_with_quota_left_is_allowed() {
        assert!(authorize(&profile(true, 499, 500), MeteredAction::Identify).is_allowed());
    }

    #[test]
    fn reservations_count_as_used() {
        let p = profile(true, 498, 500);
        assert!(authorize_with_reserved(&p, MeteredAction::Chat, 1).is_allowed());
        assert_eq!(
            authorize_with_reserved(&p, MeteredAction::Chat, 2),
            Decision::Denied(Denial::QuotaExhausted)
        );
    }

    #[test]
    fn promo_code_is_normalized_before_matching() {
        let now = Utc::now();
        let grant = redeem_code("  fiske2026 \n", now).expect("code should match");

        assert_eq!(grant.premium_type, PremiumType::Trial);
        assert_eq!(grant.ai_quota_total, 50);
        assert_eq!(grant.expires_at, Some(now + Duration::days(7)));
    }

    #[test]
    fn unknown_promo_code_grants_nothing() {
        assert!(redeem_code("FISKE2025", Utc::now()).is_none());
        assert!(redeem_code("", Utc::now()).is_none());
    }

    #[test]
    fn grant_updates_profile() {
        let mut p = profile(false, 3, 500);
        let grant = redeem_code("FISKE2026", Utc::now()).unwrap();
        p.apply_grant(&grant);

        assert!(p.is_premium);
        assert_eq!(p.premium_type, PremiumType::Trial);
        assert_eq!(p.ai_quota_total, 50);
        assert!(p.premium_expires_at.is_some());
        assert!(authorize(&p, MeteredAction::Identify).is_allowed());
    }
}
