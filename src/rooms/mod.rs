mod board;
mod join;
mod list;
mod msg;
mod new;
mod ws;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_public).post(new::new_room))
        .route("/join/{code}", post(join::join_room))
        .route("/{id}/leave", post(join::leave_room))
        .route("/{id}/messages", post(msg::send_msg))
        .route("/{id}/summary", post(msg::request_summary))
        .route("/{id}/ws", get(ws::room_ws))
        .route("/{id}/board", get(board::board_ws))
}
