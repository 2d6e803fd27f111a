use axum::{
    debug_handler,
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    presence::PresenceTracker,
    registry::{Room, RoomRegistry},
    EngineError, EngineResult,
};

#[derive(Deserialize)]
pub(crate) struct MemberBody {
    username: String,
}

#[derive(Serialize)]
pub(crate) struct JoinedRoom {
    #[serde(flatten)]
    room: Room,
    active_users: Vec<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn join_room(
    State(registry): State<RoomRegistry>,
    State(presence): State<PresenceTracker>,
    Path(code): Path<String>,
    Json(MemberBody { username }): Json<MemberBody>,
) -> EngineResult<Json<JoinedRoom>> {
    let username = valid_username(&username)?;

    // 404 and 410 stay distinct here: "no such room" vs "this room ended".
    let room = registry.resolve_by_code(&code).await?;
    presence.join(room.id, username).await?;
    let active_users = presence.active_users(room.id).await?;

    Ok(Json(JoinedRoom { room, active_users }))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn leave_room(
    State(presence): State<PresenceTracker>,
    Path(room_id): Path<Uuid>,
    Json(MemberBody { username }): Json<MemberBody>,
) -> EngineResult<()> {
    let username = valid_username(&username)?;
    presence.leave(room_id, username).await
}

pub(crate) fn valid_username(username: &str) -> EngineResult<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(EngineError::Validation("username must not be empty".into()));
    }
    Ok(username)
}
