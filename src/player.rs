//! Players in the room roster
//!
//! Players are identified by a server-assigned identifier which arrives
//! either as a JSON string or a JSON number depending on the endpoint, so
//! both spellings are accepted and normalized to text.

use serde::{Deserialize, Serialize};
use serde_with::SerializeDisplay;

use crate::{WireId, leaderboard};

/// A unique identifier for a player in a room
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    SerializeDisplay,
    derive_more::Display,
    derive_more::From,
)]
#[serde(from = "WireId")]
pub struct PlayerId(String);

impl PlayerId {
    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<WireId> for PlayerId {
    fn from(value: WireId) -> Self {
        Self(value.into())
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Serialization helper for Player struct
#[derive(Deserialize)]
struct PlayerSerde {
    id: PlayerId,
    #[serde(default, alias = "playerName", alias = "username")]
    name: Option<String>,
    #[serde(default)]
    score: Option<serde_json::Value>,
}

/// A participant of the room as shown on the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PlayerSerde")]
pub struct Player {
    /// Unique identifier within the room
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Absolute score, zero until the first leaderboard update
    pub score: i64,
}

impl From<PlayerSerde> for Player {
    /// Fills in the defaults for fields the server may omit
    ///
    /// A missing, null or non-numeric score becomes 0 and a missing name
    /// becomes empty.
    fn from(serde: PlayerSerde) -> Self {
        let PlayerSerde { id, name, score } = serde;
        Self {
            id,
            name: name.unwrap_or_default(),
            score: score
                .as_ref()
                .and_then(leaderboard::score_from_value)
                .unwrap_or_default(),
        }
    }
}

impl Player {
    /// Creates a player with a zero score
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score: 0,
        }
    }

    /// Returns a copy of this player with the given score
    #[must_use]
    pub fn with_score(self, score: i64) -> Self {
        Self { score, ..self }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_accepts_string_and_number() {
        let from_text: PlayerId = serde_json::from_str("\"p1\"").unwrap();
        assert_eq!(from_text.as_str(), "p1");

        let from_number: PlayerId = serde_json::from_str("42").unwrap();
        assert_eq!(from_number.as_str(), "42");
        assert_eq!(serde_json::to_string(&from_number).unwrap(), "\"42\"");
    }

    #[test]
    fn test_player_score_defaults_to_zero() {
        let player: Player = serde_json::from_str(r#"{"id":"p1","name":"Ann"}"#).unwrap();
        assert_eq!(player, Player::new("p1", "Ann"));

        let null_score: Player =
            serde_json::from_str(r#"{"id":7,"name":"Bo","score":null}"#).unwrap();
        assert_eq!(null_score.score, 0);
        assert_eq!(null_score.id.as_str(), "7");

        let text_score: Player =
            serde_json::from_str(r#"{"id":"p2","name":"Cy","score":"12"}"#).unwrap();
        assert_eq!(text_score.score, 0);
    }

    #[test]
    fn test_player_keeps_numeric_score() {
        let player: Player =
            serde_json::from_str(r#"{"id":"p1","playerName":"Ann","score":9}"#).unwrap();
        assert_eq!(player.score, 9);
        assert_eq!(player.name, "Ann");
    }

    #[test]
    fn test_player_without_id_is_rejected() {
        let result: Result<Player, _> = serde_json::from_str(r#"{"name":"Ann"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_with_score() {
        let player = Player::new("p1", "Ann").with_score(5);
        assert_eq!(player.score, 5);
        assert_eq!(player.name, "Ann");
    }
}
