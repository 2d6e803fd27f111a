use axum::{
    debug_handler,
    extract::{Path, Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    registry::RoomRegistry, rooms::join::valid_username, rooms::ws::ViewerQuery, EngineError,
    EngineResult,
};

/// Whiteboard relay: fans opaque JSON draw payloads out to the room's other
/// connected clients. Nothing is persisted and nothing here touches the
/// lifecycle invariants; it is a separate data channel gated on the room's
/// feature flag.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn board_ws(
    Path(room_id): Path<Uuid>,
    Query(viewer): Query<ViewerQuery>,
    State(registry): State<RoomRegistry>,
    State(boards): State<broadcast::Sender<(Uuid, String)>>,
    ws: WebSocketUpgrade,
) -> EngineResult<Response> {
    valid_username(&viewer.username)?;
    let room = registry.resolve_by_id(room_id).await?;
    if !room.whiteboard {
        return Err(EngineError::Validation("room has no whiteboard".into()));
    }

    Ok(ws
        .on_upgrade(async move |socket| {
            let mut rx = boards.subscribe();
            let (mut sender, mut receiver) = socket.split();

            let relay_task = tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok((id, payload)) if id == room_id => {
                            if sender.send(payload.into()).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        // Drawing frames are lossy; skip what we missed.
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });

            while let Some(Ok(frame)) = receiver.next().await {
                let data = frame.into_data();
                // Payloads are opaque, but only well-formed JSON is relayed.
                if serde_json::from_slice::<serde_json::Value>(&data).is_err() {
                    continue;
                }
                let Ok(payload) = String::from_utf8(data.to_vec()) else {
                    continue;
                };
                let _ = boards.send((room_id, payload));
            }
            relay_task.abort();
        })
        .into_response())
}
