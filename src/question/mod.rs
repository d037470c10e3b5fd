//! Questions and their wire representation
//!
//! This module defines the canonical question model shared by the host and
//! the players: single-choice (MCQ), multi-choice (MSQ) and numeric-answer
//! (NAT) questions. It also decodes the loosely shaped question payload
//! pushed over the realtime channel and returned in room snapshots.
//!
//! Authoring lives in [`draft`], answering in [`answer`].

pub mod answer;
pub mod draft;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{SerializeDisplay, skip_serializing_none};
use thiserror::Error;

use crate::WireId;

/// Errors that can occur while decoding a question payload
#[derive(Error, Debug)]
pub enum Error {
    /// The options were sent as a string that is not a JSON array of strings
    #[error("malformed options: {0}")]
    Options(#[source] serde_json::Error),
}

/// The kind of answer a question expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QuestionType {
    /// Exactly one option may be selected
    #[default]
    #[serde(rename = "MCQ", alias = "mcq", alias = "single-choice")]
    SingleChoice,
    /// Any subset of the options may be selected
    #[serde(rename = "MSQ", alias = "msq", alias = "multi-choice")]
    MultiChoice,
    /// A free-text numeric answer is typed in
    #[serde(rename = "NAT", alias = "nat", alias = "numeric")]
    Numeric,
}

impl QuestionType {
    /// Checks if the question presents options to choose from
    pub fn has_options(self) -> bool {
        !matches!(self, Self::Numeric)
    }
}

/// A unique identifier for a question instance
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    SerializeDisplay,
    derive_more::Display,
    derive_more::From,
)]
#[serde(from = "WireId")]
pub struct QuestionId(String);

impl QuestionId {
    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<WireId> for QuestionId {
    fn from(value: WireId) -> Self {
        Self(value.into())
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Reference to the correct answer, only ever known to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    /// Index of the correct option of a single-choice question
    Index(usize),
    /// Indexes of the correct options of a multi-choice question
    Indexes(Vec<usize>),
    /// Expected text of a numeric-answer question
    Text(String),
}

/// The question currently presented in the room
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Identifier used when submitting answers
    pub id: QuestionId,
    /// The kind of answer expected
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// The prompt
    pub text: String,
    /// Options in display order, empty for numeric-answer questions
    pub options: Vec<String>,
    /// Correct answer reference, present on the host side only
    pub correct_answer: Option<CorrectAnswer>,
    /// Absolute deadline after which answers are no longer accepted
    pub end_time: Option<DateTime<Utc>>,
    /// Broadcast instance key distinguishing re-sends of the same question
    pub question_key: Option<String>,
    /// Whether the question has already been broadcast
    pub sent: bool,
}

impl Question {
    /// Key identifying this broadcast instance
    ///
    /// Local answer state is tied to this key: a new key means a new
    /// question to answer, the same key means a retransmission.
    pub fn instance_key(&self) -> &str {
        self.question_key.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Options as they appear on the wire: inline or JSON-encoded
#[derive(Deserialize)]
#[serde(untagged)]
enum OptionsField {
    Inline(Vec<String>),
    Encoded(String),
}

impl OptionsField {
    fn decode(self) -> Result<Vec<String>, Error> {
        match self {
            Self::Inline(options) => Ok(options),
            Self::Encoded(encoded) if encoded.trim().is_empty() => Ok(Vec::new()),
            Self::Encoded(encoded) => serde_json::from_str(&encoded).map_err(Error::Options),
        }
    }
}

/// Question payload as pushed by the server
///
/// Options may arrive as an inline `options` array, as a JSON-encoded string
/// in `options`, or as a JSON-encoded string in `optionsJson`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    id: WireId,
    #[serde(rename = "type", default)]
    kind: QuestionType,
    #[serde(default)]
    text: String,
    #[serde(default)]
    options: Option<OptionsField>,
    #[serde(default)]
    options_json: Option<String>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    question_key: Option<WireId>,
}

impl QuestionPayload {
    /// Builds the canonical question out of the payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::Options`] if the options are JSON-encoded but do not
    /// decode to an array of strings.
    pub fn into_question(self) -> Result<Question, Error> {
        let options = match (self.options, self.options_json) {
            (Some(options), _) => options.decode()?,
            (None, Some(encoded)) => OptionsField::Encoded(encoded).decode()?,
            (None, None) => Vec::new(),
        };

        Ok(Question {
            id: self.id.into(),
            kind: self.kind,
            text: self.text,
            options: if self.kind.has_options() {
                options
            } else {
                Vec::new()
            },
            correct_answer: None,
            end_time: self.end_time,
            question_key: self.question_key.map(Into::into),
            sent: true,
        })
    }
}

impl TryFrom<QuestionPayload> for Question {
    type Error = Error;

    fn try_from(payload: QuestionPayload) -> Result<Self, Self::Error> {
        payload.into_question()
    }
}
