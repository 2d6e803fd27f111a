use axum::{
    debug_handler,
    extract::{Path, Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    presence::PresenceTracker, receipts::ReadReceipts, registry::RoomRegistry,
    rooms::join::valid_username, stream::MessageStream, EngineResult,
};

#[derive(Deserialize)]
pub(crate) struct ViewerQuery {
    pub(crate) username: String,
}

/// Subscription surface: one websocket per (room, viewer). Every frame is
/// the full ordered, visibility-filtered snapshot for this viewer. Closing
/// the socket cancels the subscription; nothing store-side is kept per
/// subscriber.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    Path(room_id): Path<Uuid>,
    Query(ViewerQuery { username }): Query<ViewerQuery>,
    State(registry): State<RoomRegistry>,
    State(presence): State<PresenceTracker>,
    State(stream): State<MessageStream>,
    State(receipts): State<ReadReceipts>,
    ws: WebSocketUpgrade,
) -> EngineResult<Response> {
    let username = valid_username(&username)?.to_owned();

    let room = registry.resolve_by_id(room_id).await?;
    presence.join(room.id, &username).await?;

    Ok(ws
        .on_upgrade(async move |socket| {
            let mut sub = stream.subscribe(room_id, &username);
            let (mut sender, mut receiver) = socket.split();

            let push_task = tokio::spawn(async move {
                let mut snapshot = match sub.current().await {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(%room_id, "initial snapshot failed: {err}");
                        return;
                    }
                };
                loop {
                    let Ok(payload) = serde_json::to_string(&snapshot) else {
                        break;
                    };
                    if sender.send(payload.into()).await.is_err() {
                        break;
                    }

                    // Delivered counts as rendered: record reads for other
                    // authors' ephemeral messages so they hide from this
                    // viewer's future snapshots.
                    for message in &snapshot {
                        if message.ephemeral && message.username != username {
                            if let Err(err) = receipts.mark_read(message.id, &username).await {
                                warn!(%room_id, "mark-read failed: {err}");
                            }
                        }
                    }

                    snapshot = match sub.next_snapshot().await {
                        Ok(Some(next)) => next,
                        Ok(None) => break,
                        Err(err) => {
                            warn!(%room_id, "subscription query failed: {err}");
                            break;
                        }
                    };
                }
            });

            // Clients speak on the send endpoint, not this socket; all we do
            // here is notice it going away.
            while let Some(Ok(_)) = receiver.next().await {}
            push_task.abort();
        })
        .into_response())
}
