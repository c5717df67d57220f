use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    session::Identity,
    store::{server_timestamp, Document, StoreError},
};

pub const ROOMS: &str = "rooms";
pub const CREATED_AT: &str = "createdAt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: String,
    pub creator_name: String,
    pub members: Vec<String>,
}

impl Room {
    /// Builds a room from a stored document and the id the store gave it.
    pub fn from_document(id: String, mut document: Document) -> Result<Room, StoreError> {
        document.insert("id".to_owned(), Value::String(id.clone()));
        serde_json::from_value(Value::Object(document))
            .map_err(|err| StoreError::Malformed(format!("room {id}: {err}")))
    }
}

/// Document written for a new room. `createdAt` is left for the store to fill.
pub(crate) fn new_room_document(creator: &Identity, name: &str, description: &str) -> Document {
    let mut document = Document::new();
    document.insert("name".to_owned(), Value::from(name));
    document.insert("description".to_owned(), Value::from(description));
    document.insert(CREATED_AT.to_owned(), server_timestamp());
    document.insert("createdBy".to_owned(), Value::from(creator.uid.as_str()));
    document.insert("creatorName".to_owned(), Value::from(creator.name_or_anonymous()));
    document.insert("members".to_owned(), Value::from(vec![creator.uid.clone()]));
    document
}
