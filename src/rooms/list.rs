use axum::{debug_handler, extract::State, Json};
use serde::Serialize;

use crate::{
    presence::PresenceTracker,
    registry::{Room, RoomRegistry},
    stream::{Message, MessageStream},
    EngineResult,
};

#[derive(Serialize)]
pub(crate) struct RoomPreview {
    #[serde(flatten)]
    room: Room,
    active_users: Vec<String>,
    latest_message: Option<Message>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_public(
    State(registry): State<RoomRegistry>,
    State(presence): State<PresenceTracker>,
    State(stream): State<MessageStream>,
) -> EngineResult<Json<Vec<RoomPreview>>> {
    let mut previews = Vec::new();
    for room in registry.list_public().await? {
        let active_users = presence.active_users(room.id).await?;
        let latest_message = stream.latest(room.id).await?;
        previews.push(RoomPreview { room, active_users, latest_message });
    }
    Ok(Json(previews))
}
