//! Realtime event decoding and mapping
//!
//! Inbound frames on the room topic are loosely typed JSON envelopes of the
//! form `{"type": TAG, "payload": ...}`. They are decoded at the boundary
//! into the closed [`RealtimeEvent`] type; a frame that does not decode is
//! logged and dropped without touching the store.
//!
//! The [`EventMapper`] folds each event into exactly one store mutation.
//! Every mutation is idempotent, so duplicated or replayed events leave the
//! state unchanged.

use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    effect::{Effect, Notification, Route},
    leaderboard::ScoreDelta,
    player::Player,
    question::{self, Question, QuestionPayload},
    store::RoomStore,
};

/// The kind of a realtime event without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum EventKind {
    /// A player joined the room
    PlayerJoined,
    /// The host broadcast a question
    Question,
    /// Scores changed
    Leaderboard,
    /// The current question closed
    QuestionEnded,
    /// The quiz finished
    QuizEnded,
    /// The host ended the room
    RoomEnded,
}

impl EventKind {
    /// Resolves a wire tag
    ///
    /// Tags are matched case-insensitively with `-` and `_` treated alike,
    /// so `PLAYER_JOINED` and `player-joined` are the same tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized = tag.trim().to_ascii_uppercase().replace('-', "_");
        Some(match normalized.as_str() {
            "PLAYER_JOINED" => Self::PlayerJoined,
            "QUESTION" => Self::Question,
            "LEADERBOARD" => Self::Leaderboard,
            "QUESTION_ENDED" => Self::QuestionEnded,
            "QUIZ_ENDED" => Self::QuizEnded,
            "ROOM_ENDED" => Self::RoomEnded,
            _ => return None,
        })
    }
}

/// Errors that can occur while decoding a realtime frame
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The frame is not a JSON envelope
    #[error("malformed frame: {0}")]
    Frame(#[source] serde_json::Error),
    /// The envelope carries a tag this client does not know
    #[error("unknown event tag {0:?}")]
    UnknownTag(String),
    /// The payload does not match the shape expected for its tag
    #[error("malformed {kind:?} payload: {source}")]
    Payload {
        /// The tag of the envelope
        kind: EventKind,
        /// The underlying decoding error
        #[source]
        source: serde_json::Error,
    },
    /// The question payload carries undecodable options
    #[error(transparent)]
    Question(#[from] question::Error),
}

/// Serialization helper for the inbound envelope
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type", alias = "event")]
    tag: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// A decoded realtime event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// A player joined the room
    PlayerJoined(Player),
    /// The host broadcast a question
    Question(Question),
    /// Scores changed
    Leaderboard(ScoreDelta),
    /// The current question closed
    QuestionEnded,
    /// The quiz finished
    QuizEnded,
    /// The host ended the room
    RoomEnded,
}

impl RealtimeEvent {
    /// Returns the kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PlayerJoined(_) => EventKind::PlayerJoined,
            Self::Question(_) => EventKind::Question,
            Self::Leaderboard(_) => EventKind::Leaderboard,
            Self::QuestionEnded => EventKind::QuestionEnded,
            Self::QuizEnded => EventKind::QuizEnded,
            Self::RoomEnded => EventKind::RoomEnded,
        }
    }

    /// Decodes a raw frame
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the frame is not an envelope, has an
    /// unknown tag, or carries a payload of the wrong shape.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let Envelope { tag, payload } = serde_json::from_str(frame).map_err(DecodeError::Frame)?;
        let kind = EventKind::from_tag(&tag).ok_or(DecodeError::UnknownTag(tag))?;
        let payload_error = |source| DecodeError::Payload { kind, source };

        Ok(match kind {
            EventKind::PlayerJoined => {
                Self::PlayerJoined(serde_json::from_value(payload).map_err(payload_error)?)
            }
            EventKind::Question => Self::Question(
                serde_json::from_value::<QuestionPayload>(payload)
                    .map_err(payload_error)?
                    .into_question()?,
            ),
            EventKind::Leaderboard => Self::Leaderboard(ScoreDelta::from_value(&payload)),
            EventKind::QuestionEnded => Self::QuestionEnded,
            EventKind::QuizEnded => Self::QuizEnded,
            EventKind::RoomEnded => Self::RoomEnded,
        })
    }
}

/// Folds realtime events into the room store
#[derive(Debug, Default, Clone)]
pub struct EventMapper {
    applied: EnumMap<EventKind, usize>,
    dropped: usize,
}

impl EventMapper {
    /// Creates a mapper with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many events of a kind were applied
    pub fn applied(&self, kind: EventKind) -> usize {
        self.applied[kind]
    }

    /// Returns how many frames were dropped as malformed
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Applies one decoded event to the store
    ///
    /// # Returns
    ///
    /// The effects the user interface must carry out
    pub fn apply(&mut self, store: &mut RoomStore, event: RealtimeEvent) -> Vec<Effect> {
        let kind = event.kind();
        self.applied[kind] += 1;
        debug!(?kind, "applying realtime event");

        match event {
            RealtimeEvent::PlayerJoined(player) => {
                store.add_player(player);
                Vec::new()
            }
            RealtimeEvent::Question(question) => {
                store.set_current_question(Some(question));
                Vec::new()
            }
            RealtimeEvent::Leaderboard(delta) => {
                store.set_leaderboard(&delta);
                Vec::new()
            }
            RealtimeEvent::QuestionEnded => {
                store.set_current_question(None);
                Vec::new()
            }
            RealtimeEvent::QuizEnded => vec![Notification::success("Quiz ended").into()],
            RealtimeEvent::RoomEnded => {
                store.reset_room();
                vec![
                    Notification::error("Room ended").into(),
                    Route::Landing.into(),
                ]
            }
        }
    }

    /// Decodes a raw frame, counting and logging it if it is malformed
    pub fn decode(&mut self, frame: &str) -> Option<RealtimeEvent> {
        match RealtimeEvent::decode(frame) {
            Ok(event) => Some(event),
            Err(error) => {
                self.dropped += 1;
                warn!(%error, "dropping realtime frame");
                None
            }
        }
    }

    /// Decodes a raw frame and applies it
    ///
    /// Malformed frames are logged and dropped; they never affect the store.
    pub fn handle_frame(&mut self, store: &mut RoomStore, frame: &str) -> Vec<Effect> {
        self.decode(frame)
            .map(|event| self.apply(store, event))
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::{
        player::PlayerId, question::QuestionType, room_id::RoomId, store::RoomState,
    };

    const QUESTION: &str = r#"{"type":"QUESTION","payload":{"id":1,"type":"MCQ","text":"Capital?","options":["Paris","Berlin"],"endTime":"2026-01-01T10:00:30Z","questionKey":"k1"}}"#;

    fn hosted_store() -> RoomStore {
        let mut store = RoomStore::new();
        store.create_room(RoomId::from_str("123456").unwrap(), "Hana".to_owned());
        store
    }

    #[test]
    fn test_tag_normalization() {
        assert_eq!(EventKind::from_tag("PLAYER_JOINED"), Some(EventKind::PlayerJoined));
        assert_eq!(EventKind::from_tag("player-joined"), Some(EventKind::PlayerJoined));
        assert_eq!(EventKind::from_tag("question-ended"), Some(EventKind::QuestionEnded));
        assert_eq!(EventKind::from_tag("Room_Ended"), Some(EventKind::RoomEnded));
        assert_eq!(EventKind::from_tag("PLAYER_LEFT"), None);
    }

    #[test]
    fn test_decode_player_joined() {
        let event =
            RealtimeEvent::decode(r#"{"type":"PLAYER_JOINED","payload":{"id":"p1","name":"Ann"}}"#)
                .unwrap();
        assert_eq!(event, RealtimeEvent::PlayerJoined(Player::new("p1", "Ann")));
    }

    #[test]
    fn test_decode_question_with_encoded_options() {
        let event = RealtimeEvent::decode(
            r#"{"type":"QUESTION","payload":{"id":"7","type":"MSQ","text":"Pick","options":"[\"A\",\"B\"]"}}"#,
        )
        .unwrap();
        let RealtimeEvent::Question(question) = event else {
            panic!("expected a question event");
        };
        assert_eq!(question.kind, QuestionType::MultiChoice);
        assert_eq!(question.options, ["A", "B"]);
    }

    #[test]
    fn test_decode_lifecycle_events_ignore_payload() {
        for (frame, expected) in [
            (r#"{"type":"QUIZ_ENDED","payload":{"roomId":"1"}}"#, RealtimeEvent::QuizEnded),
            (r#"{"type":"ROOM_ENDED"}"#, RealtimeEvent::RoomEnded),
            (r#"{"type":"QUESTION_ENDED","payload":null}"#, RealtimeEvent::QuestionEnded),
        ] {
            assert_eq!(RealtimeEvent::decode(frame).unwrap(), expected);
        }
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(RealtimeEvent::decode("not json"), Err(DecodeError::Frame(_))));
        assert!(matches!(
            RealtimeEvent::decode(r#"{"type":"CONFETTI","payload":{}}"#),
            Err(DecodeError::UnknownTag(tag)) if tag == "CONFETTI"
        ));
        assert!(matches!(
            RealtimeEvent::decode(r#"{"type":"PLAYER_JOINED","payload":{"name":"no id"}}"#),
            Err(DecodeError::Payload { kind: EventKind::PlayerJoined, .. })
        ));
        assert!(matches!(
            RealtimeEvent::decode(
                r#"{"type":"QUESTION","payload":{"id":1,"type":"MCQ","text":"?","optionsJson":"{bad"}}"#
            ),
            Err(DecodeError::Question(_))
        ));
    }

    #[test]
    fn test_player_joined_replay_is_idempotent() {
        let mut store = hosted_store();
        let mut mapper = EventMapper::new();
        let frame = r#"{"type":"PLAYER_JOINED","payload":{"id":"p1","name":"Ann"}}"#;

        mapper.handle_frame(&mut store, frame);
        let once = store.snapshot();
        mapper.handle_frame(&mut store, frame);

        assert_eq!(*once, *store.snapshot());
        assert_eq!(store.state().players().len(), 1);
        assert_eq!(mapper.applied(EventKind::PlayerJoined), 2);
    }

    #[test]
    fn test_leaderboard_event_overlays_scores() {
        let mut store = hosted_store();
        store.set_players(vec![Player::new("p1", "Ann"), Player::new("p2", "Bo")]);
        let mut mapper = EventMapper::new();

        mapper.handle_frame(&mut store, r#"{"type":"LEADERBOARD","payload":{"p1":5}}"#);

        let state = store.state();
        assert_eq!(state.player(&PlayerId::from("p1")).unwrap().score, 5);
        assert_eq!(state.player(&PlayerId::from("p2")).unwrap().score, 0);
    }

    #[test]
    fn test_question_then_question_ended() {
        let mut store = hosted_store();
        let mut mapper = EventMapper::new();

        assert!(mapper.handle_frame(&mut store, QUESTION).is_empty());
        assert_eq!(store.state().current_question().unwrap().text, "Capital?");

        mapper.handle_frame(&mut store, r#"{"type":"QUESTION_ENDED"}"#);
        assert!(store.state().current_question().is_none());
    }

    #[test]
    fn test_quiz_ended_only_notifies() {
        let mut store = hosted_store();
        store.add_player(Player::new("p1", "Ann"));
        let before = store.snapshot();
        let mut mapper = EventMapper::new();

        let effects = mapper.handle_frame(&mut store, r#"{"type":"QUIZ_ENDED"}"#);

        assert_eq!(effects, [Effect::Notify(Notification::success("Quiz ended"))]);
        assert_eq!(*before, *store.snapshot());
    }

    #[test]
    fn test_room_ended_after_question_clears_everything() {
        let mut store = hosted_store();
        let mut mapper = EventMapper::new();
        mapper.handle_frame(
            &mut store,
            r#"{"type":"PLAYER_JOINED","payload":{"id":"p1","name":"Ann"}}"#,
        );
        mapper.handle_frame(&mut store, QUESTION);

        let effects = mapper.handle_frame(&mut store, r#"{"type":"ROOM_ENDED"}"#);

        assert_eq!(*store.snapshot(), RoomState::default());
        assert_eq!(
            effects,
            [
                Effect::Notify(Notification::error("Room ended")),
                Effect::Navigate(Route::Landing),
            ]
        );
    }

    #[test]
    fn test_malformed_frame_is_dropped_without_side_effects() {
        let mut store = hosted_store();
        store.add_player(Player::new("p1", "Ann"));
        let before = store.snapshot();
        let revision = store.revision();
        let mut mapper = EventMapper::new();

        assert!(mapper.handle_frame(&mut store, "{").is_empty());
        assert!(mapper.handle_frame(&mut store, r#"{"type":"NOPE"}"#).is_empty());

        assert_eq!(mapper.dropped(), 2);
        assert_eq!(*before, *store.snapshot());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_events_in_any_order_converge() {
        let join = r#"{"type":"PLAYER_JOINED","payload":{"id":"p1","name":"Ann"}}"#;
        let scores = r#"{"type":"LEADERBOARD","payload":{"p1":4}}"#;

        let mut forward = hosted_store();
        let mut mapper = EventMapper::new();
        for frame in [join, QUESTION, scores, QUESTION, join] {
            mapper.handle_frame(&mut forward, frame);
        }

        let mut replayed = hosted_store();
        for frame in [join, scores, QUESTION, join, scores, QUESTION] {
            mapper.handle_frame(&mut replayed, frame);
        }

        assert_eq!(*forward.snapshot(), *replayed.snapshot());
        assert_eq!(forward.state().players()[0].score, 4);
    }
}
