use axum::{debug_handler, extract::State, Json};

use crate::{
    registry::{Room, RoomConfig, RoomRegistry},
    EngineResult,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_room(
    State(registry): State<RoomRegistry>,
    Json(config): Json<RoomConfig>,
) -> EngineResult<Json<Room>> {
    let room = registry.create(config).await?;
    Ok(Json(room))
}
