//! Client configuration
//!
//! Runtime settings for a [`RoomClient`](crate::client::RoomClient): where the
//! consumed API lives, how the realtime channel backs off after a drop, how
//! often the countdown recomputes, and how much of the leaderboard to render.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};

use crate::{constants, session::ReconnectPolicy};

/// Validation result type for duration validation
type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds.
///
/// This is a custom validation function for use with the `garde` crate.
/// It checks if the duration in seconds is within the inclusive range
/// defined by `MIN_SECONDS` and `MAX_SECONDS`.
///
/// # Errors
///
/// Returns a `garde::Error` if the duration is outside the specified bounds.
pub fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    val: &Duration,
    _ctx: &(),
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "outside of bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Settings shared by every flow of the client
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Base URL prepended to every API path; empty means same origin
    #[garde(length(max = 2048))]
    pub api_base: String,
    /// Backoff applied by the realtime channel after a dropped connection
    #[garde(dive)]
    pub reconnect: ReconnectPolicy,
    /// Interval between countdown recomputations
    #[serde_as(as = "DurationSeconds<u64>")]
    #[garde(custom(validate_duration::<1, 10>))]
    pub tick_interval: Duration,
    /// Number of standings rendered by the leaderboard view
    #[garde(range(min = 1, max = 1000))]
    pub leaderboard_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            reconnect: ReconnectPolicy::default(),
            tick_interval: constants::countdown::TICK,
            leaderboard_limit: constants::leaderboard::DISPLAY_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration pointing at the given API base
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::default()
        }
    }

    /// Joins the API base with an absolute path
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base.trim_end_matches('/'))
    }

    /// URL of the realtime endpoint
    pub fn realtime_url(&self) -> String {
        self.url(constants::realtime::ENDPOINT)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.api_base, "");
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let config = ClientConfig::new("https://quiz.example/");
        assert_eq!(
            config.url("/api/rooms/create"),
            "https://quiz.example/api/rooms/create"
        );
        assert_eq!(config.realtime_url(), "https://quiz.example/ws");

        let same_origin = ClientConfig::default();
        assert_eq!(same_origin.url("/api/auth/me"), "/api/auth/me");
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"apiBase":"http://localhost:8080","tickInterval":2}"#)
                .unwrap();
        assert_eq!(config.api_base, "http://localhost:8080");
        assert_eq!(config.tick_interval, Duration::from_secs(2));
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_out_of_bounds_tick() {
        let config = ClientConfig {
            tick_interval: Duration::from_secs(30),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_zero_leaderboard_limit() {
        let config = ClientConfig {
            leaderboard_limit: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duration_bounds() {
        assert!(validate_duration::<1, 10>(&Duration::from_secs(1), &()).is_ok());
        assert!(validate_duration::<1, 10>(&Duration::from_secs(10), &()).is_ok());
        assert!(validate_duration::<1, 10>(&Duration::from_secs(0), &()).is_err());
        assert!(validate_duration::<1, 10>(&Duration::from_secs(11), &()).is_err());
    }
}
