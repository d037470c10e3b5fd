//! Room client orchestration
//!
//! [`RoomClient`] ties the store, the event mapper, the realtime
//! subscription, the answer flow, the countdown and the host's question deck
//! together behind the flows the user interface triggers. Every method takes
//! `&self`: the client lives on a single cooperative event loop, interior
//! state sits in [`RefCell`]s, and no borrow is ever held across an `.await`.
//!
//! Network results are applied only if the room they were issued for is
//! still the current room; otherwise they are logged and discarded.

use std::{
    cell::{Cell, RefCell},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    TruncatedVec,
    api::{
        ApiRequest, ApiResponse, Backend, CreatedRoom, CsrfTokenBody, CurrentUser, RoomSnapshot,
        TransportError,
    },
    config::ClientConfig,
    constants,
    countdown::{self, Countdown, TickHandle},
    effect::{Effect, Notification, Route},
    event::{EventKind, EventMapper, RealtimeEvent},
    leaderboard::{self, Standing},
    names,
    question::{
        self, QuestionPayload,
        answer::{AnswerFlow, Phase, Rejection},
        draft::{self, HostDeck, QuestionDraft},
    },
    room_id::{self, RoomId},
    session::{Channel, Subscription},
    store::{ChatMessage, ChatRole, RoomState, RoomStore},
};

/// Errors surfaced by the client flows
#[derive(Error, Debug)]
pub enum Error {
    /// The display name is unusable
    #[error(transparent)]
    Name(#[from] names::Error),
    /// The room code or identifier is unusable
    #[error(transparent)]
    RoomId(#[from] room_id::Error),
    /// The question draft cannot be edited or broadcast
    #[error(transparent)]
    Draft(#[from] draft::Error),
    /// The submit click was refused locally
    #[error(transparent)]
    Rejected(#[from] Rejection),
    /// The server rejected the session
    #[error("please sign in again")]
    Unauthorized,
    /// The server answered with a non-2xx status
    #[error("request failed with status {0}")]
    Status(u16),
    /// No response was received
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A request or response body could not be (de)serialized
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
    /// A question payload carried undecodable options
    #[error(transparent)]
    Question(#[from] question::Error),
    /// The flow requires being in a room
    #[error("you are not in a room")]
    NoRoom,
    /// The flow is reserved to the host
    #[error("only the host can do that")]
    NotHost,
    /// Another broadcast is still in flight
    #[error("a question is already being sent")]
    Busy,
    /// Submitting the answer failed
    #[error("failed to submit answer")]
    SubmitFailed(#[source] Box<Error>),
    /// Broadcasting the question failed
    #[error("failed to send question")]
    BroadcastFailed(#[source] Box<Error>),
    /// Ending the room failed, the room is kept
    #[error("failed to leave room")]
    LeaveFailed(#[source] Box<Error>),
}

impl Error {
    /// Turns the error into the transient notification shown to the user
    pub fn notification(&self) -> Notification {
        let message = self.to_string();
        let mut chars = message.chars();
        let message = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Notification::error(message)
    }
}

/// Result type of the client flows
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Whether realtime events wait for the initial snapshot
#[derive(Debug, Default)]
enum SnapshotGate {
    /// The snapshot of a view mount is in flight; events are held in arrival order
    Pending {
        view: u64,
        held: Vec<RealtimeEvent>,
    },
    #[default]
    Ready,
}

/// The client of one participant
pub struct RoomClient<B, C> {
    config: ClientConfig,
    backend: B,
    channel: C,
    store: RefCell<RoomStore>,
    mapper: RefCell<EventMapper>,
    subscription: RefCell<Subscription>,
    gate: RefCell<SnapshotGate>,
    view: Cell<u64>,
    answer: RefCell<Option<AnswerFlow>>,
    countdown: RefCell<Countdown>,
    deck: RefCell<HostDeck>,
    broadcasting: Cell<bool>,
    csrf_token: RefCell<Option<String>>,
}

impl<B: Backend, C: Channel> RoomClient<B, C> {
    /// Creates a client outside of any room
    pub fn new(config: ClientConfig, backend: B, channel: C) -> Self {
        Self {
            subscription: RefCell::new(Subscription::new(config.reconnect)),
            countdown: RefCell::new(Countdown::new(config.tick_interval)),
            config,
            backend,
            channel,
            store: RefCell::default(),
            mapper: RefCell::default(),
            gate: RefCell::default(),
            view: Cell::new(0),
            answer: RefCell::default(),
            deck: RefCell::default(),
            broadcasting: Cell::new(false),
            csrf_token: RefCell::default(),
        }
    }

    /// Returns the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the HTTP backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the realtime channel
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Returns the current room snapshot
    pub fn state(&self) -> Arc<RoomState> {
        self.store.borrow().snapshot()
    }

    /// Returns the store revision, for change detection
    pub fn revision(&self) -> u64 {
        self.store.borrow().revision()
    }

    /// Returns the ranked leaderboard, truncated to the configured limit
    pub fn standings(&self) -> TruncatedVec<Standing> {
        leaderboard::standings(
            self.store.borrow().state().players(),
            self.config.leaderboard_limit,
        )
    }

    /// Returns the answering state of the current question
    pub fn answer(&self) -> Option<AnswerFlow> {
        self.answer.borrow().clone()
    }

    /// Returns the phase of the current question's answer
    pub fn answer_phase(&self) -> Option<Phase> {
        self.answer.borrow().as_ref().map(AnswerFlow::phase)
    }

    /// Returns the last computed countdown value
    pub fn remaining_seconds(&self) -> u64 {
        self.countdown.borrow().remaining()
    }

    /// Returns the host's question deck
    pub fn deck(&self) -> HostDeck {
        self.deck.borrow().clone()
    }

    /// Returns how many events of a kind were applied
    pub fn applied_events(&self, kind: EventKind) -> usize {
        self.mapper.borrow().applied(kind)
    }

    /// Returns how many realtime frames were dropped as malformed
    pub fn dropped_frames(&self) -> usize {
        self.mapper.borrow().dropped()
    }

    fn current_room(&self) -> Result<RoomId> {
        self.store
            .borrow()
            .state()
            .room_id()
            .cloned()
            .ok_or(Error::NoRoom)
    }

    fn is_current_room(&self, room_id: &RoomId) -> bool {
        self.store.borrow().state().room_id() == Some(room_id)
    }

    /// Returns the CSRF token, fetching it once if needed
    ///
    /// The token is read from the cookie first. If there is none, the
    /// bootstrap endpoint is called and the cookie it sets is read again,
    /// falling back to a token in the response body.
    ///
    /// # Returns
    ///
    /// `None` if the server provided no token at all; requests then go out
    /// without the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the bootstrap request fails.
    pub async fn ensure_csrf_token(&self) -> Result<Option<String>> {
        let cached = self.csrf_token.borrow().clone();
        if let Some(token) = cached.or_else(|| self.backend.cookie(constants::csrf::COOKIE_NAME)) {
            *self.csrf_token.borrow_mut() = Some(token.clone());
            return Ok(Some(token));
        }

        debug!("bootstrapping csrf token");
        let response = self
            .backend
            .execute(ApiRequest::csrf_token().with_base(&self.config.api_base))
            .await?;
        if !response.is_success() {
            return Err(Error::Status(response.status));
        }

        let token = self
            .backend
            .cookie(constants::csrf::COOKIE_NAME)
            .or_else(|| {
                serde_json::from_str::<CsrfTokenBody>(&response.body)
                    .ok()
                    .and_then(|body| body.token)
                    .map(String::from)
            });
        self.csrf_token.borrow_mut().clone_from(&token);
        Ok(token)
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let csrf_token = if request.is_state_changing() {
            self.ensure_csrf_token().await?
        } else {
            None
        };
        let request = request
            .with_csrf(csrf_token)
            .with_base(&self.config.api_base);

        debug!(method = ?request.method, path = %request.path, "sending request");
        let response = self.backend.execute(request).await?;
        match response.status {
            401 => Err(Error::Unauthorized),
            status if !response.is_success() => Err(Error::Status(status)),
            _ => Ok(response),
        }
    }

    /// Creates a room and enters it as host
    ///
    /// # Errors
    ///
    /// Returns a validation error before any network call if the name is
    /// unusable, or the network error of the create call.
    pub async fn create_room(&self, name: &str) -> Result<Vec<Effect>> {
        let name = names::validate_display_name(name)?;
        let response = self.send(ApiRequest::create_room(&name)?).await?;
        let room_id = RoomId::from_str(&CreatedRoom::identifier(&response.body))?;

        self.close_room_view();
        *self.deck.borrow_mut() = HostDeck::default();
        self.store.borrow_mut().create_room(room_id.clone(), name);

        Ok(vec![
            Notification::success(format!("Room {room_id} created!")).into(),
            Route::Host.into(),
        ])
    }

    /// Joins a room by its six-digit code
    ///
    /// # Errors
    ///
    /// Returns a validation error before any network call if the name or
    /// the code is unusable, or the network error of the join call.
    pub async fn join_room(&self, code: &str, name: &str) -> Result<Vec<Effect>> {
        let name = names::validate_display_name(name)?;
        let room_id = RoomId::parse_join_code(code)?;
        self.send(ApiRequest::join_room(&room_id, &name)?).await?;

        self.close_room_view();
        self.store.borrow_mut().join_room(room_id, name);

        Ok(vec![
            Notification::success("Joined room successfully!").into(),
            Route::Play.into(),
        ])
    }

    /// Mounts the room view: subscribes, then loads the snapshot
    ///
    /// Events received while the snapshot is in flight are held back and
    /// replayed right after it, so the snapshot cannot clobber them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRoom`] outside of a room, or the error of the
    /// snapshot request. Held events are replayed in either case.
    pub async fn open_room_view(&self, now: DateTime<Utc>) -> Result<Vec<Effect>> {
        let room_id = self.current_room()?;
        let view = self.view.get() + 1;
        self.view.set(view);
        self.subscription
            .borrow_mut()
            .activate(&self.channel, &self.config.realtime_url(), &room_id);
        {
            let mut gate = self.gate.borrow_mut();
            let held = match std::mem::take(&mut *gate) {
                SnapshotGate::Pending { held, .. } => held,
                SnapshotGate::Ready => Vec::new(),
            };
            *gate = SnapshotGate::Pending { view, held };
        }

        let fetched = self.fetch_snapshot(&room_id).await;
        if self.view.get() != view || !self.is_current_room(&room_id) {
            debug!(%room_id, view, "discarding snapshot of a superseded room view");
            return Ok(Vec::new());
        }

        let applied = fetched.and_then(|snapshot| self.apply_snapshot(snapshot));
        let effects = self.release_gate(view, now);
        applied.map(|()| effects)
    }

    async fn fetch_snapshot(&self, room_id: &RoomId) -> Result<RoomSnapshot> {
        let response = self.send(ApiRequest::room_state(room_id)).await?;
        Ok(serde_json::from_str(&response.body)?)
    }

    fn apply_snapshot(&self, snapshot: RoomSnapshot) -> Result<()> {
        let question = snapshot
            .current_question
            .map(QuestionPayload::into_question)
            .transpose()?;

        let mut store = self.store.borrow_mut();
        store.set_players(snapshot.players);
        if let Some(delta) = &snapshot.leaderboard {
            store.set_leaderboard(delta);
        }
        if question.is_some() {
            store.set_current_question(question);
        }
        Ok(())
    }

    fn release_gate(&self, view: u64, now: DateTime<Utc>) -> Vec<Effect> {
        let gate = self.gate.take();
        let held = match gate {
            SnapshotGate::Pending { view: owner, held } if owner == view => held,
            other => {
                self.gate.replace(other);
                Vec::new()
            }
        };

        let mut effects: Vec<Effect> = self.sync_question(now).into_iter().collect();
        for event in held {
            let ended = event.kind() == EventKind::RoomEnded;
            effects.extend(self.apply_event(event, now));
            if ended {
                break;
            }
        }
        effects
    }

    /// Unmounts the room view
    ///
    /// Deactivates the subscription and stops the countdown; ticks already
    /// scheduled and snapshots still in flight are discarded. The store is
    /// left untouched.
    pub fn close_room_view(&self) {
        self.view.set(self.view.get() + 1);
        self.subscription.borrow_mut().deactivate(&self.channel);
        self.countdown.borrow_mut().unmount();
        *self.gate.borrow_mut() = SnapshotGate::Ready;
        *self.answer.borrow_mut() = None;
    }

    /// Handles an inbound realtime frame
    ///
    /// Malformed frames and frames arriving after the view was closed are
    /// dropped without side effects.
    pub fn handle_frame(&self, frame: &str, now: DateTime<Utc>) -> Vec<Effect> {
        if !self.subscription.borrow().is_active() {
            debug!("ignoring frame for an inactive room view");
            return Vec::new();
        }
        let Some(event) = self.mapper.borrow_mut().decode(frame) else {
            return Vec::new();
        };
        if let SnapshotGate::Pending { held, .. } = &mut *self.gate.borrow_mut() {
            held.push(event);
            return Vec::new();
        }
        self.apply_event(event, now)
    }

    fn apply_event(&self, event: RealtimeEvent, now: DateTime<Utc>) -> Vec<Effect> {
        let ended = event.kind() == EventKind::RoomEnded;
        let mut effects = self
            .mapper
            .borrow_mut()
            .apply(&mut self.store.borrow_mut(), event);

        if ended {
            self.close_room_view();
            *self.deck.borrow_mut() = HostDeck::default();
        } else {
            effects.extend(self.sync_question(now));
        }
        effects
    }

    /// Re-derives the answer flow and the countdown from the current question
    ///
    /// Nothing is reset while the question instance stays the same.
    fn sync_question(&self, now: DateTime<Utc>) -> Option<Effect> {
        let question = self.store.borrow().state().current_question().cloned();
        let mut answer = self.answer.borrow_mut();
        let mut countdown = self.countdown.borrow_mut();

        match question {
            Some(question) if answer.as_ref().is_some_and(|flow| flow.is_for(&question)) => None,
            Some(question) => {
                let mut flow = AnswerFlow::new(&question);
                let schedule = countdown.set_deadline(question.end_time, now);
                if countdown.is_expired() {
                    flow.lock();
                }
                *answer = Some(flow);
                Some(schedule.into())
            }
            None if answer.is_some() => {
                *answer = None;
                Some(countdown.set_deadline(None, now).into())
            }
            None => None,
        }
    }

    /// Handles a countdown interval tick
    ///
    /// Reaching zero locks the answer flow unless an answer was already
    /// accepted.
    ///
    /// # Returns
    ///
    /// The new remaining seconds, or `None` for a stale tick
    pub fn tick(&self, handle: TickHandle, now: DateTime<Utc>) -> Option<u64> {
        let remaining = self.countdown.borrow_mut().tick(handle, now)?;
        if remaining == 0
            && let Some(flow) = self.answer.borrow_mut().as_mut()
            && flow.phase() != Phase::Answered
        {
            flow.lock();
        }
        Some(remaining)
    }

    /// Records that the realtime transport connected
    pub fn on_connected(&self) {
        self.subscription.borrow_mut().on_connected(&self.channel);
    }

    /// Records that the realtime transport dropped
    ///
    /// # Returns
    ///
    /// The delay after which the transport should reconnect, if still wanted
    pub fn on_disconnected(&self) -> Option<Duration> {
        self.subscription.borrow_mut().on_disconnected()
    }

    /// Selects (single-choice) or toggles (multi-choice) an option
    ///
    /// # Returns
    ///
    /// `false` if the selection could not change
    pub fn select_option(&self, index: usize) -> bool {
        self.answer
            .borrow_mut()
            .as_mut()
            .is_some_and(|flow| flow.select(index))
    }

    /// Sets the free-text answer of a numeric question
    pub fn set_answer_text(&self, text: &str) -> bool {
        self.answer
            .borrow_mut()
            .as_mut()
            .is_some_and(|flow| flow.set_text(text))
    }

    /// Submits the local answer to the current question
    ///
    /// At most one submission is in flight per question. A failed request
    /// re-enables the input; a lock that happened meanwhile wins over any
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] without any network call when the flow
    /// refuses the click, or [`Error::SubmitFailed`] when the request failed.
    pub async fn submit_answer(&self, now: DateTime<Utc>) -> Result<()> {
        let room_id = self.current_room()?;
        let remaining = countdown::remaining_seconds(self.countdown.borrow().deadline(), now);
        let (instance_key, pending) = {
            let mut answer = self.answer.borrow_mut();
            let flow = answer.as_mut().ok_or(Rejection::NoQuestion)?;
            let pending = flow.begin_submit(remaining)?;
            (flow.instance_key().to_owned(), pending)
        };

        let result = self
            .send(ApiRequest::submit_answer(
                &room_id,
                &pending.question_id,
                pending.answer,
            ))
            .await;

        let mut answer = self.answer.borrow_mut();
        match answer
            .as_mut()
            .filter(|flow| self.is_current_room(&room_id) && flow.instance_key() == instance_key)
        {
            Some(flow) => {
                flow.complete(pending.ticket, result.is_ok());
            }
            None => {
                debug!(%room_id, "discarding answer result of a superseded question");
                return Ok(());
            }
        }

        result.map(drop).map_err(|error| {
            warn!(%error, "answer submission failed");
            Error::SubmitFailed(Box::new(error))
        })
    }

    /// Applies an edit to the draft being authored
    ///
    /// # Errors
    ///
    /// Returns [`draft::Error::Locked`] if the draft was already sent.
    pub fn edit_draft<R>(&self, edit: impl FnOnce(&mut QuestionDraft) -> R) -> Result<R> {
        Ok(self.deck.borrow_mut().edit(edit)?)
    }

    /// Moves to the next draft, appending one at the end of the deck
    pub fn next_draft(&self) {
        self.deck.borrow_mut().next();
    }

    /// Moves to the previous draft
    pub fn previous_draft(&self) -> bool {
        self.deck.borrow_mut().previous()
    }

    /// Broadcasts the draft being authored
    ///
    /// The draft is validated before any network call. On success it is
    /// locked and previewed as the current question.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotHost`] for players, [`Error::Draft`] for an
    /// invalid or already sent draft, [`Error::Busy`] while another
    /// broadcast is in flight, or [`Error::BroadcastFailed`].
    pub async fn broadcast_current(&self, now: DateTime<Utc>) -> Result<Vec<Effect>> {
        let room_id = self.current_room()?;
        if !self.store.borrow().state().is_host() {
            return Err(Error::NotHost);
        }

        let (index, broadcast, preview) = {
            let deck = self.deck.borrow();
            let draft = deck.current();
            if draft.is_sent() {
                return Err(draft::Error::Locked.into());
            }
            let broadcast = draft.to_broadcast(now)?;
            let preview = draft.to_question(broadcast.end_time);
            (deck.current_index(), broadcast, preview)
        };
        let request = ApiRequest::broadcast_question(&room_id, &broadcast)?;

        if self.broadcasting.replace(true) {
            return Err(Error::Busy);
        }
        let result = self.send(request).await;
        self.broadcasting.set(false);

        if let Err(error) = result {
            warn!(%error, "question broadcast failed");
            return Err(Error::BroadcastFailed(Box::new(error)));
        }
        if !self.is_current_room(&room_id) {
            debug!(%room_id, "discarding broadcast result of a room that was left");
            return Ok(Vec::new());
        }

        self.deck.borrow_mut().mark_sent(index);
        self.store
            .borrow_mut()
            .set_current_question(Some(preview));

        let mut effects = vec![Notification::success(format!("Question {} sent", index + 1)).into()];
        effects.extend(self.sync_question(now));
        Ok(effects)
    }

    /// Appends a message to the authoring chat log
    pub fn add_message(&self, role: ChatRole, content: impl Into<String>) -> Arc<RoomState> {
        self.store
            .borrow_mut()
            .add_message(ChatMessage::new(role, content))
    }

    /// Leaves the room; a host ends it for everyone first
    ///
    /// # Errors
    ///
    /// Returns [`Error::LeaveFailed`] if the host's end call failed, in
    /// which case the room is kept.
    pub async fn leave_room(&self) -> Result<Vec<Effect>> {
        let state = self.state();
        if let Some(room_id) = state.room_id()
            && state.is_host()
        {
            if let Err(error) = self.send(ApiRequest::end_room(room_id)).await {
                warn!(%error, %room_id, "ending room failed");
                return Err(Error::LeaveFailed(Box::new(error)));
            }
        }

        self.close_room_view();
        *self.deck.borrow_mut() = HostDeck::default();
        self.store.borrow_mut().leave_room();
        Ok(vec![Route::Landing.into()])
    }

    /// Fetches the authenticated user
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] without a valid session.
    pub async fn current_user(&self) -> Result<CurrentUser> {
        let response = self.send(ApiRequest::me()).await?;
        Ok(serde_json::from_str(&response.body)?)
    }
}
