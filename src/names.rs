//! Display name validation
//!
//! The local participant chooses a display name before creating or joining a
//! room. The name is cleaned and checked here so that an unusable name is
//! reported inline and never reaches the network.

use rustrict::CensorStr;
use serde::Serialize;
use thiserror::Error;

use crate::constants;

/// Errors that can occur during display name validation
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The name is empty or contains only whitespace
    #[error("please enter your name")]
    Empty,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
}

/// Cleans and validates a display name
///
/// # Arguments
///
/// * `name` - The requested name (whitespace is trimmed and collapsed)
///
/// # Returns
///
/// The cleaned name on success.
///
/// # Errors
///
/// * `Error::Empty` - Name is empty after trimming whitespace
/// * `Error::TooLong` - Name exceeds 30 characters
/// * `Error::Sinful` - Name contains inappropriate content
pub fn validate_display_name(name: &str) -> Result<String, Error> {
    let name = rustrict::trim_whitespace(name);
    if name.is_empty() {
        return Err(Error::Empty);
    }
    if name.chars().count() > constants::names::MAX_LENGTH {
        return Err(Error::TooLong);
    }
    if name.is_inappropriate() {
        return Err(Error::Sinful);
    }
    Ok(name.to_owned())
}
