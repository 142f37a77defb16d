//! AI collaborators: species classification, the fishing chat assistant and
//! spot search.
//!
//! All are opaque, slow and fallible. Callers pass the quota gate first (see
//! [`crate::metered`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fangst_shared::constants::CHAT_HISTORY_TURNS;
use fangst_shared::AiResult;

use crate::error::RemoteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Identify the species in the referenced image.
    async fn classify(&self, image_ref: &str) -> Result<AiResult, RemoteError>;
}

#[async_trait]
pub trait ChatAssistant: Send + Sync {
    async fn reply(&self, message: &str, history: &[ChatTurn]) -> Result<String, RemoteError>;
}

/// A suggested fishing spot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FishingSpot {
    pub name: String,
    #[serde(rename = "type")]
    pub spot_type: String,
    pub season: String,
    pub tips: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[async_trait]
pub trait SpotFinder: Send + Sync {
    async fn find_spots(&self, species: &str, area: &str) -> Result<Vec<FishingSpot>, RemoteError>;
}

/// Finder used when no spot service is configured: the same three lakeside
/// and archipelago spots for every search.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockSpotFinder;

#[async_trait]
impl SpotFinder for MockSpotFinder {
    async fn find_spots(&self, species: &str, _area: &str) -> Result<Vec<FishingSpot>, RemoteError> {
        let spot = |name: &str, spot_type: &str, season: &str, tips: String, coordinates| FishingSpot {
            name: name.into(),
            spot_type: spot_type.into(),
            season: season.into(),
            tips,
            coordinates,
        };
        Ok(vec![
            spot(
                "Långgrundet",
                "Insjö",
                "Vår och Höst",
                format!("Utmärkt för {species}. Fiska nära vassen med jigg."),
                Some(Coordinates { lat: 59.5, lng: 18.0 }),
            ),
            spot("Djupviken", "Insjö", "Hela året", "Djupt vatten, prova bottenmete.".into(), None),
            spot("Stenudden", "Skärgård", "Sommarkvällar", "Bra strömmar här. Använd skeddrag.".into(), None),
        ])
    }
}

/// The most recent turns sent along with a chat message.
pub fn recent_history(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(CHAT_HISTORY_TURNS);
    &history[start..]
}
