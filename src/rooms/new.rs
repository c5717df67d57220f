use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::warn;

use crate::{res, session, store::DocumentStore, AppResult};

use super::service;

#[derive(Debug, Deserialize)]
pub(crate) struct NewRoomForm {
    name: String,
    #[serde(default)]
    description: String,
}

/// Home form submission; lands on the new room's chat view.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_room(
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,

    Form(NewRoomForm { name, description }): Form<NewRoomForm>,
) -> AppResult<Response> {
    if name.trim().is_empty() {
        warn!("rejected room without a name");
        return Ok((StatusCode::BAD_REQUEST, "room name required").into_response());
    }

    let identity = session::identity(&session).await?;
    let id = match service::create_room(store.as_ref(), identity.as_ref(), &name, &description).await {
        Ok(id) => id,
        Err(err) => return Ok(err.into_response()),
    };

    Ok(Redirect::to(&res::chat_path(&id)).into_response())
}
