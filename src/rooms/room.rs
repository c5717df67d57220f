use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, response::{Html, IntoResponse, Response}};

use crate::{include_res, res, store::DocumentStore};

use super::service::{self, RoomResult};

/// Chat view for one room.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn room(
    State(store): State<Arc<dyn DocumentStore>>,
    Path(room_id): Path<String>,
) -> RoomResult<Response> {
    // no lookup by id in the store, so the room comes out of the full listing
    let rooms = service::list_rooms(store.as_ref()).await?;
    let Some(room) = rooms.into_iter().find(|room| room.id == room_id) else {
        return Ok(res::sorry("room"));
    };

    let body = res::fill(include_res!(str, "/pages/chat.html"), &[
        ("room_name", &res::escape(&room.name)),
        ("creator_name", &res::escape(&room.creator_name)),
        ("member_count", &room.members.len().to_string()),
        ("room_description", &res::markdown(&room.description)),
    ]);

    Ok(Html(body).into_response())
}
