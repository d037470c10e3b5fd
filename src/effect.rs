//! Side effects surfaced to the user interface
//!
//! Flows never touch the UI directly. They return [`Effect`]s which the
//! embedding shell turns into toasts and route changes.

use serde::Serialize;

use crate::countdown::Schedule;

/// Severity of a transient notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Level {
    /// Something completed
    Success,
    /// Something informational happened
    Info,
    /// Something failed or was interrupted
    Error,
}

/// A transient message shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Severity
    pub level: Level,
    /// Text shown to the user
    pub message: String,
}

impl Notification {
    /// Creates a success notification
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    /// Creates an informational notification
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    /// Creates an error notification
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

/// Screens the user can be sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    /// Create/join screen
    Landing,
    /// Host authoring screen
    Host,
    /// Player answering screen
    Play,
}

/// Something the user interface must do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::From)]
pub enum Effect {
    /// Show a transient notification
    Notify(Notification),
    /// Navigate to another screen
    Navigate(Route),
    /// Start or stop the countdown interval
    Timer(Schedule),
}
