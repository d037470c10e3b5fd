//! Host question authoring
//!
//! The host edits an ordered deck of question drafts and broadcasts them one
//! at a time. A draft is validated locally before broadcast: a draft with
//! missing text, empty options or no correct answer is reported inline and
//! never sent. Once broadcast, a draft is locked against further edits.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, json::JsonString, serde_as};
use thiserror::Error;

use super::{CorrectAnswer, Question, QuestionId, QuestionType};
use crate::{config::validate_duration, constants::question as limits};

/// Errors reported while editing or broadcasting a draft
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The draft was already broadcast
    #[error("question already sent")]
    Locked,
    /// The prompt is empty
    #[error("question text is empty")]
    EmptyText,
    /// A choice question has fewer than two options
    #[error("add at least two options")]
    TooFewOptions,
    /// A choice question has an empty option
    #[error("all options must be filled")]
    EmptyOption,
    /// A single-choice question has no correct option
    #[error("select one correct answer")]
    NoCorrectAnswer,
    /// A multi-choice question has no correct option
    #[error("select at least one correct answer")]
    NoCorrectAnswers,
    /// A numeric-answer question has no expected answer
    #[error("enter the correct answer")]
    NoCorrectText,
    /// A field exceeds its limits
    #[error("invalid question: {0}")]
    OutOfBounds(String),
}

/// A question being authored by the host
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    /// Position-derived identifier sent with the broadcast
    #[garde(skip)]
    id: u32,
    /// The kind of answer expected
    #[serde(rename = "type")]
    #[garde(skip)]
    kind: QuestionType,
    /// The prompt
    #[garde(length(chars, max = limits::MAX_TEXT_LENGTH))]
    text: String,
    /// Options for choice questions
    #[garde(length(max = limits::MAX_OPTION_COUNT), inner(length(chars, max = limits::MAX_OPTION_LENGTH)))]
    options: Vec<String>,
    /// Correct option of a single-choice question
    #[garde(skip)]
    correct_index: Option<usize>,
    /// Correct options of a multi-choice question
    #[garde(skip)]
    correct_indexes: Vec<usize>,
    /// Expected answer of a numeric-answer question
    #[garde(length(chars, max = limits::MAX_OPTION_LENGTH))]
    correct_text: String,
    /// Time players get to answer
    #[serde_as(as = "DurationSeconds<u64>")]
    #[garde(custom(validate_duration::<{ limits::MIN_TIME_LIMIT }, { limits::MAX_TIME_LIMIT }>))]
    duration: Duration,
    /// Whether the draft was broadcast
    #[garde(skip)]
    sent: bool,
}

impl QuestionDraft {
    /// Creates an empty single-choice draft
    pub fn new(id: u32) -> Self {
        Self {
            id,
            kind: QuestionType::SingleChoice,
            text: String::new(),
            options: vec![String::new(); limits::DEFAULT_OPTION_COUNT],
            correct_index: Some(0),
            correct_indexes: Vec::new(),
            correct_text: String::new(),
            duration: Duration::from_secs(limits::DEFAULT_DURATION),
            sent: false,
        }
    }

    /// Returns the draft identifier
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the question type
    pub fn kind(&self) -> QuestionType {
        self.kind
    }

    /// Returns the prompt
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the options
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Returns the time players get to answer
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Checks if the draft was already broadcast
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// Changes the question type, clearing any correct answer reference
    pub fn set_kind(&mut self, kind: QuestionType) {
        self.kind = kind;
        self.correct_index = None;
        self.correct_indexes.clear();
        self.correct_text.clear();
        if kind.has_options() && self.options.is_empty() {
            self.options = vec![String::new(); limits::DEFAULT_OPTION_COUNT];
        }
    }

    /// Replaces the prompt
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Replaces the text of an existing option; out-of-range indexes are ignored
    pub fn set_option(&mut self, index: usize, value: impl Into<String>) {
        if let Some(option) = self.options.get_mut(index) {
            *option = value.into();
        }
    }

    /// Appends an empty option, up to the maximum option count
    pub fn add_option(&mut self) -> bool {
        if self.options.len() >= limits::MAX_OPTION_COUNT {
            return false;
        }
        self.options.push(String::new());
        true
    }

    /// Removes an option and shifts correct answer references past it
    pub fn remove_option(&mut self, index: usize) {
        if index >= self.options.len() {
            return;
        }
        self.options.remove(index);

        let shift = |i: usize| match i.cmp(&index) {
            std::cmp::Ordering::Less => Some(i),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(i - 1),
        };
        self.correct_index = self.correct_index.and_then(shift);
        self.correct_indexes = self.correct_indexes.iter().copied().filter_map(shift).collect();
    }

    /// Marks the single correct option of a single-choice question
    pub fn set_correct_index(&mut self, index: usize) {
        self.correct_index = Some(index);
    }

    /// Toggles an option in the correct set of a multi-choice question
    pub fn toggle_correct_index(&mut self, index: usize) {
        if let Some(position) = self.correct_indexes.iter().position(|i| *i == index) {
            self.correct_indexes.remove(position);
        } else {
            self.correct_indexes.push(index);
        }
    }

    /// Sets the expected answer of a numeric-answer question
    pub fn set_correct_text(&mut self, text: impl Into<String>) {
        self.correct_text = text.into();
    }

    /// Sets the time players get to answer
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Reference to the correct answer in the host's model
    pub fn correct_answer(&self) -> Option<CorrectAnswer> {
        match self.kind {
            QuestionType::SingleChoice => self.correct_index.map(CorrectAnswer::Index),
            QuestionType::MultiChoice => Some(CorrectAnswer::Indexes(
                self.correct_indexes.iter().copied().sorted().collect(),
            )),
            QuestionType::Numeric => Some(CorrectAnswer::Text(self.correct_text.trim().to_owned())),
        }
    }

    /// Checks the draft can be broadcast
    ///
    /// # Errors
    ///
    /// Checks, in order: empty prompt, missing or empty options, missing
    /// correct answer for the question type, then field limits.
    pub fn check(&self) -> Result<(), Error> {
        if self.text.trim().is_empty() {
            return Err(Error::EmptyText);
        }

        match self.kind {
            QuestionType::SingleChoice | QuestionType::MultiChoice => {
                if self.options.len() < 2 {
                    return Err(Error::TooFewOptions);
                }
                if self.options.iter().any(|o| o.trim().is_empty()) {
                    return Err(Error::EmptyOption);
                }
            }
            QuestionType::Numeric => {}
        }

        match self.kind {
            QuestionType::SingleChoice => {
                if !self.correct_index.is_some_and(|i| i < self.options.len()) {
                    return Err(Error::NoCorrectAnswer);
                }
            }
            QuestionType::MultiChoice => {
                if !self.correct_indexes.iter().any(|i| *i < self.options.len()) {
                    return Err(Error::NoCorrectAnswers);
                }
            }
            QuestionType::Numeric => {
                if self.correct_text.trim().is_empty() {
                    return Err(Error::NoCorrectText);
                }
            }
        }

        self.validate()
            .map_err(|report| Error::OutOfBounds(report.to_string()))
    }

    /// Texts of the correct answer as sent on the wire
    fn correct_answer_texts(&self) -> Vec<String> {
        match self.kind {
            QuestionType::SingleChoice => self
                .correct_index
                .and_then(|i| self.options.get(i))
                .map(|o| o.trim().to_owned())
                .into_iter()
                .collect(),
            QuestionType::MultiChoice => self
                .correct_indexes
                .iter()
                .sorted()
                .dedup()
                .filter_map(|i| self.options.get(*i))
                .map(|o| o.trim().to_owned())
                .collect(),
            QuestionType::Numeric => vec![self.correct_text.trim().to_owned()],
        }
    }

    /// Builds the broadcast request body
    ///
    /// # Arguments
    ///
    /// * `now` - Current time; the deadline is `now` plus the draft duration
    ///
    /// # Errors
    ///
    /// Returns the first failing check, see [`QuestionDraft::check`].
    pub fn to_broadcast(&self, now: DateTime<Utc>) -> Result<QuestionBroadcast, Error> {
        self.check()?;

        Ok(QuestionBroadcast {
            id: self.id,
            kind: self.kind,
            text: self.text.trim().to_owned(),
            options: self
                .kind
                .has_options()
                .then(|| self.options.iter().map(|o| o.trim().to_owned()).collect()),
            correct_answer: self.correct_answer_texts(),
            points: limits::DEFAULT_POINTS,
            time_limit_seconds: self.duration.as_secs(),
            end_time: now + TimeDelta::from_std(self.duration).unwrap_or_default(),
        })
    }

    /// The question as previewed by the host once broadcast
    pub fn to_question(&self, end_time: DateTime<Utc>) -> Question {
        Question {
            id: QuestionId::from(self.id.to_string()),
            kind: self.kind,
            text: self.text.trim().to_owned(),
            options: if self.kind.has_options() {
                self.options.iter().map(|o| o.trim().to_owned()).collect()
            } else {
                Vec::new()
            },
            correct_answer: self.correct_answer(),
            end_time: Some(end_time),
            question_key: None,
            sent: true,
        }
    }
}

/// Request body of `POST /api/rooms/{id}/quiz/question`
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBroadcast {
    /// Draft identifier
    pub id: u32,
    /// Question type tag
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// Trimmed prompt
    pub text: String,
    /// Options, sent as a JSON-encoded string; null for numeric questions
    #[serde(rename = "optionsJson")]
    #[serde_as(as = "Option<JsonString>")]
    pub options: Option<Vec<String>>,
    /// Texts of the correct answer
    pub correct_answer: Vec<String>,
    /// Points awarded for a correct answer
    pub points: u64,
    /// Time limit in seconds
    pub time_limit_seconds: u64,
    /// Absolute deadline
    pub end_time: DateTime<Utc>,
}

/// The host's ordered list of drafts and the one being edited
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostDeck {
    drafts: Vec<QuestionDraft>,
    current: usize,
}

impl Default for HostDeck {
    /// A deck with a single empty draft
    fn default() -> Self {
        Self {
            drafts: vec![QuestionDraft::new(1)],
            current: 0,
        }
    }
}

impl HostDeck {
    /// Returns the draft being edited
    pub fn current(&self) -> &QuestionDraft {
        &self.drafts[self.current]
    }

    /// Returns the index of the draft being edited
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Returns the 1-indexed position of the draft being edited
    pub fn position(&self) -> usize {
        self.current + 1
    }

    /// Returns the number of drafts
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    /// A deck always holds at least one draft
    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Returns all drafts in order
    pub fn drafts(&self) -> &[QuestionDraft] {
        &self.drafts
    }

    /// Applies an edit to the current draft
    ///
    /// # Errors
    ///
    /// Returns [`Error::Locked`] if the current draft was already broadcast.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut QuestionDraft) -> R) -> Result<R, Error> {
        let draft = &mut self.drafts[self.current];
        if draft.sent {
            return Err(Error::Locked);
        }
        Ok(f(draft))
    }

    /// Moves to the next draft, appending a fresh one at the end of the deck
    pub fn next(&mut self) {
        if self.current + 1 == self.drafts.len() {
            let id = u32::try_from(self.drafts.len() + 1).unwrap_or(u32::MAX);
            self.drafts.push(QuestionDraft::new(id));
        }
        self.current += 1;
    }

    /// Moves to the previous draft
    ///
    /// # Returns
    ///
    /// `false` if already at the first draft
    pub fn previous(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Marks the draft at `index` as broadcast
    pub fn mark_sent(&mut self, index: usize) {
        if let Some(draft) = self.drafts.get_mut(index) {
            draft.sent = true;
        }
    }
}
