//! Leaderboard deltas and standings
//!
//! The server pushes leaderboard updates as a partial mapping from player
//! identifier to absolute score. This module decodes that mapping leniently
//! and derives the ranked standings rendered by the live leaderboard.

use std::{cmp::Reverse, collections::HashMap};

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::{
    TruncatedVec,
    player::{Player, PlayerId},
};

/// Reads an absolute score out of a loosely typed JSON value
///
/// Integers are accepted as-is and floats only when they are finite whole
/// numbers; anything else (strings, null, objects) yields `None`.
pub fn score_from_value(value: &serde_json::Value) -> Option<i64> {
    if let Some(score) = value.as_i64() {
        return Some(score);
    }
    let float = value.as_f64()?;
    if float.is_finite() && float.fract() == 0. && float.abs() < 9.0e15 {
        Some(float as i64)
    } else {
        None
    }
}

/// A partial overlay of absolute scores keyed by player
///
/// Entries whose value is not numeric are dropped while decoding, so an
/// overlay never carries anything that could corrupt an existing score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreDelta(HashMap<PlayerId, i64>);

impl ScoreDelta {
    /// Builds a delta from a loosely typed JSON value
    ///
    /// A value that is not an object yields an empty delta.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let Some(object) = value.as_object() else {
            debug!(%value, "ignoring leaderboard payload that is not an object");
            return Self::default();
        };
        Self(
            object
                .iter()
                .filter_map(|(id, score)| match score_from_value(score) {
                    Some(score) => Some((PlayerId::from(id.as_str()), score)),
                    None => {
                        debug!(player = %id, %score, "ignoring non-numeric score");
                        None
                    }
                })
                .collect(),
        )
    }

    /// Returns the new score for a player, if the overlay carries one
    pub fn get(&self, id: &PlayerId) -> Option<i64> {
        self.0.get(id).copied()
    }

    /// Returns the number of entries in the overlay
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the overlay carries no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for ScoreDelta {
    /// Deserializes leniently, see [`ScoreDelta::from_value`]
    fn deserialize<D>(deserializer: D) -> Result<ScoreDelta, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

impl<I: Into<PlayerId>> FromIterator<(I, i64)> for ScoreDelta {
    fn from_iter<T: IntoIterator<Item = (I, i64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(id, score)| (id.into(), score)).collect())
    }
}

/// One row of the rendered leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    /// Position on the leaderboard (1-indexed)
    pub rank: usize,
    /// The player's identifier
    pub id: PlayerId,
    /// The player's display name
    pub name: String,
    /// The player's absolute score
    pub score: i64,
}

/// Ranks the roster by descending score
///
/// Players with equal scores keep their roster order, so rows do not jump
/// around between updates that leave their scores unchanged.
///
/// # Arguments
///
/// * `players` - The roster in join order
/// * `limit` - Maximum number of rows to keep
///
/// # Returns
///
/// The top `limit` standings together with the exact roster size
pub fn standings(players: &[Player], limit: usize) -> TruncatedVec<Standing> {
    TruncatedVec::new(
        players
            .iter()
            .sorted_by_key(|player| Reverse(player.score))
            .enumerate()
            .map(|(index, player)| Standing {
                rank: index + 1,
                id: player.id.clone(),
                name: player.name.clone(),
                score: player.score,
            }),
        limit,
        players.len(),
    )
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_from_value() {
        assert_eq!(score_from_value(&json!(5)), Some(5));
        assert_eq!(score_from_value(&json!(-3)), Some(-3));
        assert_eq!(score_from_value(&json!(4.0)), Some(4));
        assert_eq!(score_from_value(&json!(4.5)), None);
        assert_eq!(score_from_value(&json!("5")), None);
        assert_eq!(score_from_value(&json!(null)), None);
        assert_eq!(score_from_value(&json!({"points": 5})), None);
    }

    #[test]
    fn test_score_delta_drops_non_numeric_entries() {
        let delta: ScoreDelta =
            serde_json::from_str(r#"{"p1": 5, "p2": "lots", "p3": null, "4": 2}"#).unwrap();
        assert_eq!(delta.len(), 2);
        assert_eq!(delta.get(&PlayerId::from("p1")), Some(5));
        assert_eq!(delta.get(&PlayerId::from("p2")), None);
        assert_eq!(delta.get(&PlayerId::from("4")), Some(2));
    }

    #[test]
    fn test_score_delta_from_non_object() {
        assert!(ScoreDelta::from_value(&json!([1, 2, 3])).is_empty());
        assert!(ScoreDelta::from_value(&json!("p1")).is_empty());
        assert!(ScoreDelta::from_value(&json!(null)).is_empty());
    }

    #[test]
    fn test_standings_sorted_descending_with_ranks() {
        let players = vec![
            Player::new("a", "Ann").with_score(3),
            Player::new("b", "Bo").with_score(10),
            Player::new("c", "Cy").with_score(7),
        ];

        let standings = standings(&players, 50);

        assert_eq!(standings.exact_count(), 3);
        let names: Vec<_> = standings.items().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Bo", "Cy", "Ann"]);
        let ranks: Vec<_> = standings.items().iter().map(|s| s.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
    }

    #[test]
    fn test_standings_ties_keep_roster_order() {
        let players = vec![
            Player::new("a", "Ann"),
            Player::new("b", "Bo"),
            Player::new("c", "Cy").with_score(1),
        ];

        let standings = standings(&players, 50);
        let ids: Vec<_> = standings.items().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn test_standings_truncated() {
        let players = (0..10)
            .map(|i| Player::new(format!("p{i}").as_str(), format!("P{i}")).with_score(i))
            .collect_vec();

        let standings = standings(&players, 3);

        assert_eq!(standings.exact_count(), 10);
        assert_eq!(standings.items().len(), 3);
        assert_eq!(standings.items()[0].score, 9);
    }

    #[test]
    fn test_standings_empty_roster() {
        let standings = standings(&[], 50);
        assert_eq!(standings.exact_count(), 0);
        assert!(standings.items().is_empty());
    }
}
