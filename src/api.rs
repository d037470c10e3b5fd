//! Consumed HTTP contract
//!
//! Request builders for every endpoint the client calls, the response shapes
//! it decodes, and the [`Backend`] seam through which the embedding shell
//! performs the actual requests (with cookies and credentials included).

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    WireId,
    leaderboard::ScoreDelta,
    player::{Player, PlayerId},
    question::{QuestionId, QuestionPayload, draft::QuestionBroadcast},
    room_id::RoomId,
};

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Method {
    /// Safe read
    Get,
    /// State-changing call, carries the CSRF header
    Post,
}

/// Body of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// No body
    Empty,
    /// `application/json`
    Json(String),
    /// `text/plain`, sent verbatim
    Text(String),
}

/// A request to the quiz API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute path, joined with the configured API base by the client
    pub path: String,
    /// Request body
    pub body: Body,
    /// Value of the CSRF header, if any
    pub csrf_token: Option<String>,
}

#[derive(Serialize)]
struct NameBody<'a> {
    name: &'a str,
}

impl ApiRequest {
    fn get(path: String) -> Self {
        Self {
            method: Method::Get,
            path,
            body: Body::Empty,
            csrf_token: None,
        }
    }

    fn post(path: String, body: Body) -> Self {
        Self {
            method: Method::Post,
            path,
            body,
            csrf_token: None,
        }
    }

    fn json(value: &impl Serialize) -> Result<Body, serde_json::Error> {
        serde_json::to_string(value).map(Body::Json)
    }

    /// Checks if this request changes server state and needs a CSRF token
    pub fn is_state_changing(&self) -> bool {
        self.method == Method::Post
    }

    /// Attaches the CSRF token header value
    #[must_use]
    pub fn with_csrf(self, csrf_token: Option<String>) -> Self {
        Self { csrf_token, ..self }
    }

    /// Prefixes the path with an API base
    #[must_use]
    pub fn with_base(self, base: &str) -> Self {
        Self {
            path: format!("{}{}", base.trim_end_matches('/'), self.path),
            ..self
        }
    }

    /// `POST /api/rooms/create`
    ///
    /// # Errors
    ///
    /// Returns a serialization error, which cannot happen for a plain name.
    pub fn create_room(name: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::post(
            "/api/rooms/create".to_owned(),
            Self::json(&NameBody { name })?,
        ))
    }

    /// `POST /api/rooms/{id}/join`
    ///
    /// # Errors
    ///
    /// Returns a serialization error, which cannot happen for a plain name.
    pub fn join_room(room_id: &RoomId, name: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::post(
            format!("/api/rooms/{room_id}/join"),
            Self::json(&NameBody { name })?,
        ))
    }

    /// `GET /api/rooms/{id}/state`
    pub fn room_state(room_id: &RoomId) -> Self {
        Self::get(format!("/api/rooms/{room_id}/state"))
    }

    /// `POST /api/rooms/{id}/quiz/question`
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the broadcast cannot be encoded.
    pub fn broadcast_question(
        room_id: &RoomId,
        broadcast: &QuestionBroadcast,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::post(
            format!("/api/rooms/{room_id}/quiz/question"),
            Self::json(broadcast)?,
        ))
    }

    /// `POST /api/rooms/{id}/answers/{questionId}` with the normalized
    /// answer as raw text body
    pub fn submit_answer(room_id: &RoomId, question_id: &QuestionId, answer: String) -> Self {
        Self::post(
            format!("/api/rooms/{room_id}/answers/{question_id}"),
            Body::Text(answer),
        )
    }

    /// `POST /api/rooms/{id}/end`
    pub fn end_room(room_id: &RoomId) -> Self {
        Self::post(format!("/api/rooms/{room_id}/end"), Body::Empty)
    }

    /// `GET /api/auth/me`
    pub fn me() -> Self {
        Self::get("/api/auth/me".to_owned())
    }

    /// `GET /api/csrf-token`
    pub fn csrf_token() -> Self {
        Self::get("/api/csrf-token".to_owned())
    }
}

/// A response from the quiz API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl ApiResponse {
    /// Creates a `200 OK` response
    pub fn ok(body: impl Into<String>) -> Self {
        Self::with_status(200, body)
    }

    /// Creates a response with an arbitrary status
    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Checks for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("request failed: {0}")]
pub struct TransportError(pub String);

/// Trait for performing HTTP requests
///
/// Implementations send requests with credentials included so the session
/// cookie travels along, and expose the cookie jar for the CSRF token.
pub trait Backend {
    /// Performs a request
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if no response was received. Non-2xx
    /// responses are not errors at this level.
    fn execute(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>>;

    /// Reads a cookie by name
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Point-in-time room state returned by `GET /api/rooms/{id}/state`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// The roster
    #[serde(default)]
    pub players: Vec<Player>,
    /// Scores to overlay onto the roster
    #[serde(default)]
    pub leaderboard: Option<ScoreDelta>,
    /// The question currently presented, if any
    #[serde(default)]
    pub current_question: Option<QuestionPayload>,
}

/// The authenticated user returned by `GET /api/auth/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User identifier
    pub id: PlayerId,
    /// Display name
    #[serde(default, alias = "username", alias = "displayName")]
    pub name: Option<String>,
}

/// Body of `GET /api/csrf-token`
#[derive(Deserialize)]
pub(crate) struct CsrfTokenBody {
    #[serde(default)]
    pub token: Option<WireId>,
}

/// Body of `POST /api/rooms/create`: either a bare identifier or an object
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum CreatedRoom {
    Object {
        #[serde(alias = "roomId", alias = "code")]
        id: WireId,
    },
    Bare(WireId),
}

impl CreatedRoom {
    /// Extracts the room identifier out of a create response body
    ///
    /// Plain text bodies are taken verbatim; JSON strings, numbers and
    /// objects are decoded.
    pub fn identifier(body: &str) -> String {
        match serde_json::from_str::<Self>(body) {
            Ok(Self::Object { id } | Self::Bare(id)) => id.into(),
            Err(_) => body.trim().to_owned(),
        }
    }
}
