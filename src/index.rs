use std::sync::Arc;

use axum::{debug_handler, extract::State, response::{Html, IntoResponse, Response}};
use time::macros::format_description;
use tower_sessions::Session;

use crate::{include_res, res, rooms, session, store::DocumentStore, AppResult};

/// Home view: every room, newest first, plus the create-room form.
#[debug_handler(state = crate::AppState)]
pub async fn index(
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session
) -> AppResult<Response> {
    let rooms = match rooms::list_rooms(store.as_ref()).await {
        Ok(rooms) => rooms,
        Err(err) => return Ok(err.into_response()),
    };

    let mut room_items = String::new();
    for room in rooms {
        let created_at = room
            .created_at
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
            .unwrap_or_default();

        room_items += &res::fill(include_res!(str, "/pages/room_item.html"), &[
            ("chat_href", &res::chat_href(&room.id)),
            ("name", &res::escape(&room.name)),
            ("creator_name", &res::escape(&room.creator_name)),
            ("created_at", &created_at),
        ]);
    }

    let user_name = session::identity(&session)
        .await?
        .map(|identity| identity.name_or_anonymous().to_owned())
        .unwrap_or_default();

    Ok(
        Html(
            res::fill(include_res!(str, "/pages/index.html"), &[
                ("user_name", &res::escape(&user_name)),
                ("room_items", &room_items),
            ])
        ).into_response()
    )
}
