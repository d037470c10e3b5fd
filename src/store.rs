//! Room state store
//!
//! [`RoomState`] is an immutable snapshot of everything the room view
//! renders: who we are in which room, the roster, the current question and
//! the host's authoring chat log. [`RoomStore`] is the context object handed
//! to every consumer; each mutation replaces the whole snapshot, so a
//! consumer detects change by comparing the revision or the `Arc` pointer.
//!
//! Every mutation is a pure data transform that cannot fail. Realtime
//! mutations are idempotent, so replaying the same event leaves the state
//! unchanged.

use std::{fmt::Display, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use crate::{
    leaderboard::ScoreDelta,
    player::{Player, PlayerId},
    question::Question,
    room_id::RoomId,
};

/// The local participant's role in the room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Created the room, authors and broadcasts questions
    Host,
    /// Joined the room, answers questions
    Player,
}

/// Who the local participant is and in which room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomIdentity {
    /// The room being viewed
    pub room_id: RoomId,
    /// The local participant's role
    pub role: Role,
    /// The local participant's display name
    pub display_name: String,
}

/// A unique identifier for a chat message
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Typed by the host
    User,
    /// Produced by the authoring assistant
    Assistant,
}

/// An entry of the host's authoring chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier
    pub id: MessageId,
    /// Author
    pub role: ChatRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Creates a message with a fresh identifier
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
        }
    }
}

/// Immutable snapshot of the room view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoomState {
    identity: Option<RoomIdentity>,
    players: Vec<Player>,
    current_question: Option<Question>,
    messages: Vec<ChatMessage>,
}

impl RoomState {
    /// Returns who we are in which room, if in a room
    pub fn identity(&self) -> Option<&RoomIdentity> {
        self.identity.as_ref()
    }

    /// Returns the room being viewed
    pub fn room_id(&self) -> Option<&RoomId> {
        self.identity.as_ref().map(|identity| &identity.room_id)
    }

    /// Checks if the local participant hosts the room
    pub fn is_host(&self) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|identity| identity.role == Role::Host)
    }

    /// Returns the roster in join order
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Looks up a player by identifier
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == *id)
    }

    /// Returns the question currently presented
    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    /// Returns the authoring chat log
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Enters a room, dropping everything scoped to a previous room
    #[must_use]
    pub fn with_identity(&self, room_id: RoomId, role: Role, display_name: String) -> Self {
        Self {
            identity: Some(RoomIdentity {
                room_id,
                role,
                display_name,
            }),
            ..Self::default()
        }
    }

    /// Replaces the roster with a snapshot
    #[must_use]
    pub fn with_players(&self, players: Vec<Player>) -> Self {
        Self {
            players,
            ..self.clone()
        }
    }

    /// Appends a player unless one with the same identifier is present
    #[must_use]
    pub fn with_player(&self, player: Player) -> Self {
        if self.player(&player.id).is_some() {
            return self.clone();
        }
        let mut players = self.players.clone();
        players.push(player);
        Self {
            players,
            ..self.clone()
        }
    }

    /// Overlays absolute scores onto existing players
    ///
    /// Players missing from the overlay keep their score; overlay entries
    /// for unknown players are ignored.
    #[must_use]
    pub fn with_scores(&self, delta: &ScoreDelta) -> Self {
        Self {
            players: self
                .players
                .iter()
                .map(|player| match delta.get(&player.id) {
                    Some(score) => player.clone().with_score(score),
                    None => player.clone(),
                })
                .collect(),
            ..self.clone()
        }
    }

    /// Replaces the current question; `None` clears it
    #[must_use]
    pub fn with_question(&self, question: Option<Question>) -> Self {
        Self {
            current_question: question,
            ..self.clone()
        }
    }

    /// Appends a chat message
    #[must_use]
    pub fn with_message(&self, message: ChatMessage) -> Self {
        let mut messages = self.messages.clone();
        messages.push(message);
        Self {
            messages,
            ..self.clone()
        }
    }
}

/// The process-wide room state container
///
/// Each mutation publishes a new [`RoomState`] snapshot and returns it.
/// The revision only advances when the published snapshot differs from the
/// previous one, so idempotent replays do not trigger re-renders.
#[derive(Debug, Clone, Default)]
pub struct RoomStore {
    state: Arc<RoomState>,
    revision: u64,
}

impl RoomStore {
    /// Creates a store holding the initial, empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot
    pub fn snapshot(&self) -> Arc<RoomState> {
        Arc::clone(&self.state)
    }

    /// Returns a borrowed view of the current snapshot
    pub fn state(&self) -> &RoomState {
        &self.state
    }

    /// Returns the number of published changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn publish(&mut self, next: RoomState) -> Arc<RoomState> {
        if *self.state != next {
            self.state = Arc::new(next);
            self.revision += 1;
        }
        self.snapshot()
    }

    /// Enters a freshly created room as its host
    pub fn create_room(&mut self, room_id: RoomId, display_name: String) -> Arc<RoomState> {
        let next = self.state.with_identity(room_id, Role::Host, display_name);
        self.publish(next)
    }

    /// Enters a room as a player
    pub fn join_room(&mut self, room_id: RoomId, display_name: String) -> Arc<RoomState> {
        let next = self.state.with_identity(room_id, Role::Player, display_name);
        self.publish(next)
    }

    /// Replaces the roster from a REST snapshot
    ///
    /// Only meant for the initial load: calling it after realtime updates
    /// began would drop joins and scores the snapshot does not know about.
    pub fn set_players(&mut self, players: Vec<Player>) -> Arc<RoomState> {
        let next = self.state.with_players(players);
        self.publish(next)
    }

    /// Inserts a player if absent
    pub fn add_player(&mut self, player: Player) -> Arc<RoomState> {
        let next = self.state.with_player(player);
        self.publish(next)
    }

    /// Overlays a leaderboard delta onto the roster
    pub fn set_leaderboard(&mut self, delta: &ScoreDelta) -> Arc<RoomState> {
        let next = self.state.with_scores(delta);
        self.publish(next)
    }

    /// Replaces or clears the current question
    pub fn set_current_question(&mut self, question: Option<Question>) -> Arc<RoomState> {
        let next = self.state.with_question(question);
        self.publish(next)
    }

    /// Appends an authoring chat message
    pub fn add_message(&mut self, message: ChatMessage) -> Arc<RoomState> {
        let next = self.state.with_message(message);
        self.publish(next)
    }

    /// Leaves the room, clearing all room-scoped state
    pub fn leave_room(&mut self) -> Arc<RoomState> {
        self.publish(RoomState::default())
    }

    /// Resets the room after it ended remotely
    pub fn reset_room(&mut self) -> Arc<RoomState> {
        self.leave_room()
    }
}
