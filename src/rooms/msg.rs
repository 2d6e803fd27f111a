use axum::{
    debug_handler,
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    moderation,
    registry::RoomRegistry,
    rooms::join::valid_username,
    stream::{Message, MessageStream},
    summary::Summarizer,
    EngineError, EngineResult,
};

#[derive(Deserialize)]
pub(crate) struct SendBody {
    username: String,
    content: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn send_msg(
    State(registry): State<RoomRegistry>,
    State(stream): State<MessageStream>,
    Path(room_id): Path<Uuid>,
    Json(SendBody { username, content }): Json<SendBody>,
) -> EngineResult<Json<Message>> {
    let username = valid_username(&username)?;
    let content = content.trim();
    if content.is_empty() {
        return Err(EngineError::Validation("message content must not be empty".into()));
    }

    // The stream does not moderate; content is filtered with the room's
    // flags before it gets there.
    let room = registry.resolve_by_id(room_id).await?;
    let filtered = moderation::filter(content, room.moderate, room.advanced);
    let message = stream.append(room_id, username, &filtered).await?;

    Ok(Json(message))
}

/// Ships the requester's view of the history off to the external summarizer
/// and returns immediately; the response never waits on it.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn request_summary(
    State(registry): State<RoomRegistry>,
    State(stream): State<MessageStream>,
    State(summarizer): State<Summarizer>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<SummaryBody>,
) -> EngineResult<()> {
    let username = valid_username(&body.username)?;
    registry.resolve_by_id(room_id).await?;
    let history = stream.visible_messages(room_id, username).await?;
    summarizer.summarize(room_id, history);
    Ok(())
}

#[derive(Deserialize)]
pub(crate) struct SummaryBody {
    username: String,
}
