//! Per-question countdown
//!
//! The remaining time is derived from the question's absolute deadline and
//! the local clock, never from server ticks. The [`Countdown`] driver
//! recomputes it once immediately when a deadline is set and then on every
//! tick of a fixed interval; the embedding event loop owns the actual timer
//! and feeds ticks back in.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use web_time::{SystemTime, UNIX_EPOCH};

/// Reads the wall clock in a way that works on both native and `wasm32`
pub fn now() -> DateTime<Utc> {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    DateTime::from_timestamp_millis(i64::try_from(since_epoch.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Whole seconds left until `deadline`, floored at zero
///
/// A missing deadline yields zero.
pub fn remaining_seconds(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    deadline.map_or(0, |deadline| {
        u64::try_from((deadline - now).num_seconds()).unwrap_or_default()
    })
}

/// Handle identifying one scheduled interval
///
/// A handle becomes stale as soon as the deadline changes or the countdown
/// is unmounted; ticks carrying a stale handle are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TickHandle(u64);

/// Instruction for the event loop owning the interval timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Schedule {
    /// Start an interval and deliver each tick with the given handle
    Every {
        /// Handle to pass back with each tick
        handle: TickHandle,
        /// Interval between ticks
        period: Duration,
    },
    /// No interval is needed
    Idle,
}

/// Countdown driving the answer lock of the current question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    deadline: Option<DateTime<Utc>>,
    remaining: u64,
    period: Duration,
    generation: u64,
    mounted: bool,
}

impl Countdown {
    /// Creates an unmounted countdown ticking at `period`
    pub fn new(period: Duration) -> Self {
        Self {
            deadline: None,
            remaining: 0,
            period,
            generation: 0,
            mounted: false,
        }
    }

    /// Returns the last computed number of seconds left
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Returns the deadline being counted down to
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Checks if the countdown reached zero
    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    /// Mounts the countdown for a deadline and recomputes immediately
    ///
    /// Any previously scheduled interval becomes stale. Without a deadline
    /// the countdown drops to zero and no interval is scheduled.
    pub fn set_deadline(&mut self, deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Schedule {
        self.generation += 1;
        self.mounted = true;
        self.deadline = deadline;
        self.remaining = remaining_seconds(deadline, now);

        if deadline.is_some() && self.remaining > 0 {
            Schedule::Every {
                handle: TickHandle(self.generation),
                period: self.period,
            }
        } else {
            Schedule::Idle
        }
    }

    /// Recomputes the remaining time on an interval tick
    ///
    /// # Returns
    ///
    /// The new remaining seconds, or `None` if the tick belongs to a stale
    /// interval or the countdown is unmounted.
    pub fn tick(&mut self, handle: TickHandle, now: DateTime<Utc>) -> Option<u64> {
        if !self.mounted || handle != TickHandle(self.generation) {
            return None;
        }
        self.remaining = remaining_seconds(self.deadline, now);
        Some(self.remaining)
    }

    /// Stops the countdown; pending ticks are discarded
    pub fn unmount(&mut self) {
        self.generation += 1;
        self.mounted = false;
        self.deadline = None;
        self.remaining = 0;
    }
}
