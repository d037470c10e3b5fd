//! Room identifier parsing and management
//!
//! Rooms are identified by a short code issued by the server when the host
//! creates a room. Players type that code to join, so this module also
//! validates the typed join code before any network call is made.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use crate::constants;

/// Errors that can occur while parsing a room identifier
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The identifier is empty after trimming whitespace
    #[error("room id cannot be empty")]
    Empty,
    /// The identifier exceeds the maximum allowed length
    #[error("room id is too long")]
    TooLong,
    /// The identifier contains characters that are not allowed in a path segment
    #[error("room id contains invalid characters")]
    InvalidCharacters,
    /// The typed join code is not a six-digit number
    #[error("please enter a valid 6-digit room code")]
    NotACode,
}

/// A unique identifier for a room session
///
/// The identifier is an opaque server-issued token restricted to characters
/// that can be embedded in a URL path segment and a realtime topic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay)]
pub struct RoomId(String);

impl RoomId {
    /// Parses a join code typed by a player
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotACode`] unless the trimmed input is exactly
    /// [`CODE_LENGTH`](constants::room::CODE_LENGTH) ASCII digits.
    pub fn parse_join_code(code: &str) -> Result<Self, Error> {
        let code = code.trim();
        if code.len() == constants::room::CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_owned()))
        } else {
            Err(Error::NotACode)
        }
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomId {
    type Err = Error;

    /// Parses a server-issued room identifier
    ///
    /// Surrounding whitespace and quotes are stripped, since the create
    /// endpoint answers with a bare text body that some servers quote.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the identifier is empty, too long, or contains
    /// characters other than ASCII alphanumerics, `-` and `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_matches('"');
        if s.is_empty() {
            return Err(Error::Empty);
        }
        if s.len() > constants::room::MAX_ID_LENGTH {
            return Err(Error::TooLong);
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidCharacters);
        }
        Ok(Self(s.to_owned()))
    }
}
