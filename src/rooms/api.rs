use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{session, store::DocumentStore, AppResult};

use super::{service, Room};

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRoomRequest {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatedRoom {
    id: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list(State(store): State<Arc<dyn DocumentStore>>) -> Result<Json<Vec<Room>>, service::RoomError> {
    Ok(Json(service::list_rooms(store.as_ref()).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create(
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
    Json(CreateRoomRequest { name, description }): Json<CreateRoomRequest>,
) -> AppResult<Response> {
    let identity = session::identity(&session).await?;
    // anonymous callers get the 401 from the service instead
    if identity.is_some() && name.trim().is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "room name required").into_response());
    }

    Ok(
        match service::create_room(store.as_ref(), identity.as_ref(), &name, &description).await {
            Ok(id) => (StatusCode::CREATED, Json(CreatedRoom { id })).into_response(),
            Err(err) => err.into_response(),
        }
    )
}
