pub mod clock;
pub mod db;
pub mod moderation;
pub mod presence;
pub mod receipts;
pub mod registry;
pub mod rooms;
pub mod stream;
pub mod summary;
pub mod sweep;

use axum::{
    extract::FromRef,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    presence::PresenceTracker, receipts::ReadReceipts, registry::RoomRegistry,
    stream::MessageStream, summary::Summarizer,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub registry: RoomRegistry,
    pub presence: PresenceTracker,
    pub stream: MessageStream,
    pub receipts: ReadReceipts,
    pub summarizer: Summarizer,

    /// Whiteboard relay channel: opaque draw payloads tagged with their room.
    pub boards: broadcast::Sender<(Uuid, String)>,
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure taxonomy for the whole engine. `NotFound` and `Expired` are
/// deliberately separate: "this room never existed" and "this room existed
/// and died" are different answers for the caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("room has expired")]
    Expired,

    /// Transient store failure; safe to retry. The sweep swallows these
    /// per room and picks the work back up on the next tick.
    #[error("store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound => StatusCode::NOT_FOUND,
            EngineError::Expired => StatusCode::GONE,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
