//! The closed record schema.
//!
//! Every record carries a `schemaVersion` and is checked with
//! [`Versioned::validate`] whenever it crosses a storage boundary (remote
//! document decode, local cache read). Optional fields are explicit; nothing
//! is added or dropped depending on the code path that produced a record.

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{DEFAULT_AI_QUOTA, SCHEMA_VERSION};
use crate::entitlement::EntitlementGrant;
use crate::error::ValidationError;
use crate::timestamp::Timestamp;
use crate::types::{CatchId, CommentId, UserId};

fn current_version() -> u32 {
    SCHEMA_VERSION
}

/// Counters are updated with atomic remote increments, so a racing decrement
/// can momentarily leave a negative value behind. Clamp it instead of
/// rejecting the whole record.
fn counter<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    if raw.is_finite() && raw > 0.0 {
        Ok(raw.min(f64::from(u32::MAX)) as u32)
    } else {
        Ok(0)
    }
}

/// Shared schema check for every persisted record.
pub trait Versioned {
    fn schema_version(&self) -> u32;

    fn validate(&self) -> Result<(), ValidationError> {
        let found = self.schema_version();
        if found != SCHEMA_VERSION {
            return Err(ValidationError::SchemaVersion {
                found,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Catch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterType {
    Lake,
    Sea,
    River,
}

impl std::str::FromStr for WaterType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lake" => Ok(Self::Lake),
            "sea" => Ok(Self::Sea),
            "river" => Ok(Self::River),
            other => Err(ValidationError::UnknownVariant {
                kind: "water type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edibility {
    Yes,
    No,
    Depends,
}

/// Structured classification returned by the AI service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResult {
    pub species_name: String,
    #[serde(default)]
    pub latin_name: String,
    /// 0..=1
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub description: String,
    pub edible: Edibility,
    #[serde(default)]
    pub edible_notes: String,
    #[serde(default)]
    pub recipe_title: String,
    #[serde(default)]
    pub recipe_ingredients: Vec<String>,
    #[serde(default)]
    pub recipe_steps: Vec<String>,
    #[serde(default)]
    pub cooking_method: String,
}

impl AiResult {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(c) = self.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(ValidationError::OutOfRange {
                    field: "confidence",
                    value: c.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One reported catch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchRecord {
    #[serde(default = "current_version")]
    pub schema_version: u32,
    pub id: CatchId,
    pub owner_id: UserId,
    /// Download URL, or a transient local blob reference before upload completes.
    pub image_ref: String,
    #[serde(default)]
    pub location_text: String,
    pub water_type: WaterType,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub ai_result: Option<AiResult>,
    #[serde(default, deserialize_with = "counter")]
    pub likes_count: u32,
    #[serde(default, deserialize_with = "counter")]
    pub comments_count: u32,
    /// `None` while a server timestamp is still pending.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl Versioned for CatchRecord {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::SchemaVersion {
                found: self.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        if self.id.as_str().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if let Some(ai) = &self.ai_result {
            ai.validate()?;
        }
        Ok(())
    }
}

/// User input for a new catch, before an identifier is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCatch {
    pub owner_id: UserId,
    pub image_ref: String,
    pub location_text: String,
    pub water_type: WaterType,
    pub comment: String,
    pub is_public: bool,
    pub ai_result: Option<AiResult>,
}

impl NewCatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.owner_id.as_str().trim().is_empty() {
            return Err(ValidationError::MissingField("ownerId"));
        }
        if self.image_ref.trim().is_empty() {
            return Err(ValidationError::MissingField("imageRef"));
        }
        if let Some(ai) = &self.ai_result {
            ai.validate()?;
        }
        Ok(())
    }

    pub fn into_record(self, id: CatchId, created_at: Option<Timestamp>) -> CatchRecord {
        CatchRecord {
            schema_version: SCHEMA_VERSION,
            id,
            owner_id: self.owner_id,
            image_ref: self.image_ref,
            location_text: self.location_text,
            water_type: self.water_type,
            comment: self.comment,
            is_public: self.is_public,
            ai_result: self.ai_result,
            likes_count: 0,
            comments_count: 0,
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Like
// ---------------------------------------------------------------------------

/// Existence means liked. Never updated, only created or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRecord {
    #[serde(default = "current_version")]
    pub schema_version: u32,
    pub catch_id: CatchId,
    pub user_id: UserId,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl LikeRecord {
    pub fn new(catch_id: CatchId, user_id: UserId) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            catch_id,
            user_id,
            created_at: Some(Timestamp::now_millis()),
        }
    }

    /// Composite document id `{catchId}_{uid}`.
    pub fn doc_id(catch_id: &CatchId, user_id: &UserId) -> String {
        format!("{catch_id}_{user_id}")
    }
}

impl Versioned for LikeRecord {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    #[serde(default = "current_version")]
    pub schema_version: u32,
    pub id: CommentId,
    pub catch_id: CatchId,
    pub author_id: UserId,
    /// Snapshot taken when the comment was written; not kept in sync.
    pub display_name: String,
    #[serde(default)]
    pub photo_ref: Option<String>,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl Versioned for CommentRecord {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PremiumType {
    #[default]
    None,
    Lifetime,
    Trial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Premium and quota fields are owned by the platform; clients only request changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default = "current_version")]
    pub schema_version: u32,
    pub uid: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub premium_type: PremiumType,
    #[serde(default)]
    pub premium_expires_at: Option<Timestamp>,
    #[serde(default, deserialize_with = "counter")]
    pub ai_quota_total: u32,
    #[serde(default, deserialize_with = "counter")]
    pub ai_quota_used: u32,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub banned: bool,
}

impl UserProfile {
    /// The profile written for a first sign-in.
    pub fn new_default(uid: UserId, email: Option<String>, display_name: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            uid,
            email,
            display_name,
            created_at: None,
            is_premium: false,
            premium_type: PremiumType::None,
            premium_expires_at: None,
            ai_quota_total: DEFAULT_AI_QUOTA,
            ai_quota_used: 0,
            role: Role::User,
            banned: false,
        }
    }

    pub fn remaining_quota(&self) -> u32 {
        self.ai_quota_total.saturating_sub(self.ai_quota_used)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Name shown on comments written by this user.
    pub fn comment_name(&self) -> String {
        self.display_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Anonymous".to_string())
    }

    /// Apply an entitlement grant to this profile in place.
    pub fn apply_grant(&mut self, grant: &EntitlementGrant) {
        self.is_premium = true;
        self.premium_type = grant.premium_type;
        self.ai_quota_total = grant.ai_quota_total;
        self.premium_expires_at = grant.expires_at.map(Timestamp::from_datetime);
    }
}

impl Versioned for UserProfile {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::SchemaVersion {
                found: self.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        if self.premium_type == PremiumType::Trial && self.premium_expires_at.is_none() {
            return Err(ValidationError::MissingField("premiumExpiresAt"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catch() -> CatchRecord {
        NewCatch {
            owner_id: "u1".into(),
            image_ref: "https://img/1.jpg".into(),
            location_text: "Storsjön".into(),
            water_type: WaterType::Lake,
            comment: String::new(),
            is_public: true,
            ai_result: None,
        }
        .into_record(CatchId::from("c1"), Some(Timestamp::Millis(5.0)))
    }

    #[test]
    fn negative_counters_are_clamped() {
        let mut value = serde_json::to_value(sample_catch()).unwrap();
        value["likesCount"] = serde_json::json!(-2);
        value["commentsCount"] = serde_json::Value::Null;

        let decoded: CatchRecord = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.likes_count, 0);
        assert_eq!(decoded.comments_count, 0);
    }

    #[test]
    fn future_schema_is_rejected() {
        let mut record = sample_catch();
        record.schema_version = SCHEMA_VERSION + 1;
        assert!(matches!(
            record.validate(),
            Err(ValidationError::SchemaVersion { .. })
        ));
    }

    #[test]
    fn new_catch_requires_image() {
        let draft = NewCatch {
            owner_id: "u1".into(),
            image_ref: "   ".into(),
            location_text: String::new(),
            water_type: WaterType::Sea,
            comment: String::new(),
            is_public: false,
            ai_result: None,
        };
        assert_eq!(
            draft.validate(),
            Err(ValidationError::MissingField("imageRef"))
        );
    }

    #[test]
    fn trial_profile_needs_expiry() {
        let mut profile = UserProfile::new_default("u1".into(), None, None);
        profile.premium_type = PremiumType::Trial;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn comment_name_falls_back_to_email_local_part() {
        let profile =
            UserProfile::new_default("u1".into(), Some("kalle@example.com".into()), None);
        assert_eq!(profile.comment_name(), "kalle");
    }
}
