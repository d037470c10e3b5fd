//! Answer submission flow
//!
//! Every question instance gets its own [`AnswerFlow`], a small state
//! machine that owns the local selection and guards submission:
//!
//! ```text
//! Unanswered --begin--> Submitting --success--> Answered
//!     ^                     |
//!     +------failure--------+
//!
//! any state --countdown reaches zero--> Locked
//! ```
//!
//! `Answered` and `Locked` both refuse further submissions. `Locked` is
//! absorbing: a network result arriving after the lock never leaves it.

use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

use super::{Question, QuestionId, QuestionType};
use crate::constants;

/// Reasons a submit click is refused without any network call
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// There is no question to answer
    #[error("no question to answer")]
    NoQuestion,
    /// The countdown has expired
    #[error("time is up")]
    Locked,
    /// An answer for this question was already accepted
    #[error("answer already submitted")]
    AlreadyAnswered,
    /// A submission for this question is still in flight
    #[error("answer submission in progress")]
    InFlight,
    /// Nothing was selected or typed
    #[error("select or enter an answer first")]
    EmptyAnswer,
}

/// Submission phase of a question instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Phase {
    /// No answer accepted yet, input enabled
    #[default]
    Unanswered,
    /// A submission is in flight
    Submitting,
    /// The server accepted an answer
    Answered,
    /// The countdown expired
    Locked,
}

/// A submission handed to the network layer
///
/// The ticket ties the eventual network result back to the attempt that
/// produced it, so results for a superseded question or attempt are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSubmission {
    /// Identifies this attempt
    pub ticket: u64,
    /// The question being answered
    pub question_id: QuestionId,
    /// Normalized answer sent as the raw request body
    pub answer: String,
}

/// Local answering state for one question instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFlow {
    instance_key: String,
    question_id: QuestionId,
    kind: QuestionType,
    options: Vec<String>,
    /// Selected option indexes in click order
    selected: Vec<usize>,
    text: String,
    phase: Phase,
    next_ticket: u64,
    in_flight: Option<u64>,
}

impl AnswerFlow {
    /// Creates a fresh flow for a question
    pub fn new(question: &Question) -> Self {
        Self {
            instance_key: question.instance_key().to_owned(),
            question_id: question.id.clone(),
            kind: question.kind,
            options: question.options.clone(),
            selected: Vec::new(),
            text: String::new(),
            phase: Phase::Unanswered,
            next_ticket: 0,
            in_flight: None,
        }
    }

    /// Checks if this flow belongs to the given question instance
    pub fn is_for(&self, question: &Question) -> bool {
        self.instance_key == question.instance_key()
    }

    /// Returns the key of the question instance this flow belongs to
    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    /// Returns the current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Checks if input and submission are disabled
    pub fn is_locked(&self) -> bool {
        matches!(self.phase, Phase::Answered | Phase::Locked)
    }

    /// Returns the selected option indexes in click order
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// Returns the typed numeric answer
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Selects an option
    ///
    /// Single-choice questions replace the prior selection; multi-choice
    /// questions toggle membership. Out-of-range indexes, numeric questions
    /// and flows that no longer accept input are ignored.
    ///
    /// # Returns
    ///
    /// `true` if the selection changed
    pub fn select(&mut self, index: usize) -> bool {
        if self.phase != Phase::Unanswered || index >= self.options.len() {
            return false;
        }
        match self.kind {
            QuestionType::SingleChoice => {
                if self.selected == [index] {
                    return false;
                }
                self.selected = vec![index];
            }
            QuestionType::MultiChoice => {
                if let Some(position) = self.selected.iter().position(|i| *i == index) {
                    self.selected.remove(position);
                } else {
                    self.selected.push(index);
                }
            }
            QuestionType::Numeric => return false,
        }
        true
    }

    /// Replaces the typed answer of a numeric question
    ///
    /// # Returns
    ///
    /// `true` if the text changed
    pub fn set_text(&mut self, text: &str) -> bool {
        if self.phase != Phase::Unanswered || self.kind != QuestionType::Numeric {
            return false;
        }
        if self.text == text {
            return false;
        }
        text.clone_into(&mut self.text);
        true
    }

    /// Builds the wire value for the current selection
    ///
    /// Choice answers are the selected option texts, trimmed, sorted
    /// lexicographically and joined by [`DELIMITER`](constants::answer::DELIMITER),
    /// so that the same subset yields the same value regardless of click
    /// order. Numeric answers are the trimmed text.
    ///
    /// # Errors
    ///
    /// Returns [`Rejection::EmptyAnswer`] if nothing is selected or typed.
    pub fn normalized_answer(&self) -> Result<String, Rejection> {
        let answer = match self.kind {
            QuestionType::SingleChoice | QuestionType::MultiChoice => self
                .selected
                .iter()
                .filter_map(|i| self.options.get(*i))
                .map(|option| option.trim())
                .sorted()
                .join(constants::answer::DELIMITER),
            QuestionType::Numeric => self.text.trim().to_owned(),
        };
        if answer.is_empty() {
            Err(Rejection::EmptyAnswer)
        } else {
            Ok(answer)
        }
    }

    /// Locks the flow because the countdown expired
    ///
    /// An in-flight submission is forgotten; its result will not change the
    /// phase any more.
    pub fn lock(&mut self) {
        self.phase = Phase::Locked;
        self.in_flight = None;
    }

    /// Starts a submission attempt
    ///
    /// # Arguments
    ///
    /// * `remaining_seconds` - Current countdown value; zero locks the flow
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] when the flow is locked, already answered,
    /// has a submission in flight, or has nothing to submit. No state
    /// changes in that case except for locking on an expired countdown.
    pub fn begin_submit(&mut self, remaining_seconds: u64) -> Result<PendingSubmission, Rejection> {
        if remaining_seconds == 0 && self.phase != Phase::Answered {
            self.lock();
        }
        match self.phase {
            Phase::Locked => return Err(Rejection::Locked),
            Phase::Answered => return Err(Rejection::AlreadyAnswered),
            Phase::Submitting => return Err(Rejection::InFlight),
            Phase::Unanswered => {}
        }

        let answer = self.normalized_answer()?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        self.phase = Phase::Submitting;

        Ok(PendingSubmission {
            ticket,
            question_id: self.question_id.clone(),
            answer,
        })
    }

    /// Applies the network outcome of a submission attempt
    ///
    /// Success moves to `Answered`, failure reverts to `Unanswered` so the
    /// player can retry. Outcomes for an attempt that is no longer in flight
    /// (the flow was locked meanwhile) are ignored.
    ///
    /// # Returns
    ///
    /// The phase after applying the outcome
    pub fn complete(&mut self, ticket: u64, accepted: bool) -> Phase {
        if self.in_flight != Some(ticket) {
            return self.phase;
        }
        self.in_flight = None;
        self.phase = if accepted {
            Phase::Answered
        } else {
            Phase::Unanswered
        };
        self.phase
    }
}
