//! Configuration constants for the quiz room client
//!
//! This module contains the fixed limits and wire constants used throughout
//! the client so that validation, timing and the consumed HTTP contract stay
//! consistent between modules.

/// Room identity constants
pub mod room {
    /// Number of digits in a join code typed by a player
    pub const CODE_LENGTH: usize = 6;
    /// Maximum length of a server-issued room identifier
    pub const MAX_ID_LENGTH: usize = 64;
}

/// Display name constants
pub mod names {
    /// Maximum length of a participant display name in characters
    pub const MAX_LENGTH: usize = 30;
}

/// Question authoring constants
pub mod question {
    /// Durations, in seconds, offered to the host when authoring a question
    pub const DURATION_CHOICES: [u64; 5] = [10, 15, 30, 45, 60];
    /// Duration, in seconds, of a freshly created draft
    pub const DEFAULT_DURATION: u64 = 30;
    /// Minimum accepted time limit in seconds
    pub const MIN_TIME_LIMIT: u64 = 5;
    /// Maximum accepted time limit in seconds
    pub const MAX_TIME_LIMIT: u64 = 240;
    /// Number of (empty) options a new choice draft starts with
    pub const DEFAULT_OPTION_COUNT: usize = 4;
    /// Maximum number of options for a choice question
    pub const MAX_OPTION_COUNT: usize = 8;
    /// Maximum length of the question prompt
    pub const MAX_TEXT_LENGTH: usize = 500;
    /// Maximum length of a single option or a numeric answer
    pub const MAX_OPTION_LENGTH: usize = 200;
    /// Points attached to every broadcast question
    pub const DEFAULT_POINTS: u64 = 2;
}

/// Answer submission constants
pub mod answer {
    /// Separator placed between sorted option texts of a multi-choice answer
    pub const DELIMITER: &str = ",";
}

/// Countdown constants
pub mod countdown {
    use std::time::Duration;

    /// Interval between two countdown recomputations
    pub const TICK: Duration = Duration::from_secs(1);
}

/// Realtime channel constants
pub mod realtime {
    use std::time::Duration;

    /// Path of the realtime endpoint relative to the API base
    pub const ENDPOINT: &str = "/ws";
    /// Prefix of the per-room subscription topic
    pub const TOPIC_PREFIX: &str = "/topic/room/";
    /// Delay before the first reconnect attempt
    pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
    /// Upper bound on the delay between reconnect attempts
    pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);
    /// Growth factor applied to the delay after each failed attempt
    pub const RECONNECT_MULTIPLIER: u32 = 2;
}

/// CSRF protection constants
pub mod csrf {
    /// Name of the cookie carrying the token
    pub const COOKIE_NAME: &str = "XSRF-TOKEN";
    /// Name of the header echoing the token on state-changing calls
    pub const HEADER_NAME: &str = "X-XSRF-TOKEN";
}

/// Leaderboard constants
pub mod leaderboard {
    /// Default number of standings rendered at once
    pub const DISPLAY_LIMIT: usize = 50;
}
