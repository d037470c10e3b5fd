//! # Quiz Room Client Library
//!
//! This library provides the client-side core of a real-time multiplayer
//! quiz: a host creates a room, authors and broadcasts questions, and players
//! join, answer within a time limit and follow a live leaderboard.
//!
//! It reconciles three independent update sources into one consistent,
//! immutable room snapshot: the REST snapshot fetched when a room view
//! opens, realtime events arriving in any order and possibly duplicated, and
//! local optimistic actions such as submitting an answer. A per-question
//! countdown derived from the absolute deadline drives answer locking.
//!
//! The embedding shell supplies an HTTP [`Backend`](api::Backend) and a
//! realtime [`Channel`](session::Channel), feeds frames and timer ticks into
//! a [`RoomClient`](client::RoomClient), and renders the snapshots and
//! [`Effect`](effect::Effect)s it gets back.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
#![allow(clippy::missing_errors_doc)]
use derive_where::derive_where;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub mod constants;

pub mod api;
pub mod client;
pub mod config;
pub mod countdown;
pub mod effect;
pub mod event;
pub mod leaderboard;
pub mod names;
pub mod player;
pub mod question;
pub mod room_id;
pub mod session;
pub mod store;

/// An identifier as it appears on the wire
///
/// Depending on the endpoint the server sends identifiers either as JSON
/// strings or as JSON numbers; both are normalized to text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    /// A JSON string
    Text(String),
    /// A JSON number that fits a signed integer
    Integer(i64),
    /// A JSON number above `i64::MAX`
    Unsigned(u64),
}

impl From<WireId> for String {
    fn from(value: WireId) -> Self {
        match value {
            WireId::Text(text) => text,
            WireId::Integer(number) => number.to_string(),
            WireId::Unsigned(number) => number.to_string(),
        }
    }
}

/// A truncated vector that maintains the exact count while limiting displayed items
///
/// This structure is useful for displaying a limited number of items while
/// still showing the total count. For example, showing "10 players" but only
/// ranking the first 5.
#[derive(Debug, Clone, Serialize)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    /// The exact total count of items
    exact_count: usize,
    /// The truncated list of items (up to the limit)
    items: Vec<T>,
}

impl<T: Clone> TruncatedVec<T> {
    /// Creates a new truncated vector from an iterator
    ///
    /// # Arguments
    ///
    /// * `list` - An iterator over items to include
    /// * `limit` - Maximum number of items to include in the truncated vector
    /// * `exact_count` - The exact total count of items (may be larger than limit)
    ///
    /// # Returns
    ///
    /// A new `TruncatedVec` containing up to `limit` items from the iterator
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Returns the exact count of items
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// Returns the truncated items
    pub fn items(&self) -> &[T] {
        &self.items
    }
}
