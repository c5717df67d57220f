use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, info};

use crate::{
    session::Identity,
    store::{Direction, DocumentStore, StoreError},
};

use super::model::{new_room_document, Room, CREATED_AT, ROOMS};

pub type RoomResult<T> = Result<T, RoomError>;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("user is not signed in")]
    Unauthenticated,
    #[error("failed to store room")]
    StoreWriteFailed(#[source] StoreError),
    #[error("failed to read rooms")]
    StoreReadFailed(#[source] StoreError),
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        let status = match self {
            RoomError::Unauthenticated => StatusCode::UNAUTHORIZED,
            RoomError::StoreWriteFailed(_) | RoomError::StoreReadFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Creates a room owned by `creator` and returns its id.
///
/// Nothing touches the store unless a creator is signed in.
pub async fn create_room(
    store: &dyn DocumentStore,
    creator: Option<&Identity>,
    name: &str,
    description: &str,
) -> RoomResult<String> {
    let Some(creator) = creator else {
        return Err(RoomError::Unauthenticated);
    };

    let document = new_room_document(creator, name, description);
    let id = store.insert(ROOMS, document).await.map_err(|err| {
        error!(%err, uid = %creator.uid, "failed to create room");
        RoomError::StoreWriteFailed(err)
    })?;

    info!(room_id = %id, uid = %creator.uid, "room created");
    Ok(id)
}

/// Every room in the store, newest first.
pub async fn list_rooms(store: &dyn DocumentStore) -> RoomResult<Vec<Room>> {
    let rows = store
        .ordered_scan(ROOMS, CREATED_AT, Direction::Descending)
        .await
        .map_err(|err| {
            error!(%err, "failed to list rooms");
            RoomError::StoreReadFailed(err)
        })?;

    rows.into_iter()
        .map(|(id, document)| Room::from_document(id, document))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            error!(%err, "failed to decode room");
            RoomError::StoreReadFailed(err)
        })
}
