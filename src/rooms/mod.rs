mod api;
mod model;
mod new;
mod room;
pub mod service;

use axum::{routing::get, Router};

use crate::{guard::CHAT, AppState};

pub use model::{Room, CREATED_AT, ROOMS};
pub(crate) use new::new_room;
pub use service::{create_room, list_rooms, RoomError, RoomResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(CHAT, get(room::room))
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(api::list).post(api::create))
}
