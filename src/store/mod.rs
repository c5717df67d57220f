//! Document store boundary.
//!
//! Room logic only needs two primitives from a store: inserting a schemaless
//! document into a collection, and scanning a collection ordered by one field.
//! Stores also own the clock: a document may carry the server timestamp
//! sentinel in a top-level field, and the store replaces it with its own time.

mod firestore;
mod memory;
mod sqlite;

use std::sync::Mutex;

use async_trait::async_trait;
use rand::{distr::Alphanumeric, Rng};
use serde_json::{json, Map, Value};
use thiserror::Error;
use time::{macros::format_description, OffsetDateTime, UtcOffset};

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type Document = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

const SERVER_VALUE_KEY: &str = ".sv";
const AUTO_ID_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("malformed document: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts `document` as a new entry of `collection` and returns its id.
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<String>;

    /// Every document of `collection` ordered by `field`.
    async fn ordered_scan(
        &self,
        collection: &str,
        field: &str,
        direction: Direction,
    ) -> StoreResult<Vec<(String, Document)>>;
}

/// Placeholder asking the store to fill in its own timestamp.
pub fn server_timestamp() -> Value {
    json!({ SERVER_VALUE_KEY: "timestamp" })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.len() == 1 && obj.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some("timestamp"))
}

/// Top-level fields holding the server timestamp sentinel.
pub fn server_timestamp_fields(document: &Document) -> Vec<String> {
    document
        .iter()
        .filter(|(_, value)| is_server_timestamp(value))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Formats a timestamp as UTC RFC 3339 with nine fractional digits, so that
/// string order matches time order.
pub fn format_timestamp(at: OffsetDateTime) -> StoreResult<String> {
    at.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
        ))
        .map_err(|err| StoreError::Malformed(format!("unformattable timestamp: {err}")))
}

/// Twenty alphanumeric characters, the same shape as Firestore's auto ids.
pub fn auto_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// Wall clock that never repeats or goes backwards. Stores that outlive the
/// process seed it with [`ServerClock::starting_after`].
#[derive(Debug)]
pub struct ServerClock {
    last: Mutex<OffsetDateTime>,
}

impl Default for ServerClock {
    fn default() -> Self {
        Self { last: Mutex::new(OffsetDateTime::UNIX_EPOCH) }
    }
}

impl ServerClock {
    /// A clock whose first reading is later than `last`.
    pub fn starting_after(last: OffsetDateTime) -> Self {
        Self { last: Mutex::new(last) }
    }

    pub fn now(&self) -> OffsetDateTime {
        let mut last = self.last.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut now = OffsetDateTime::now_utc();
        if now <= *last {
            now = *last + time::Duration::nanoseconds(1);
        }
        *last = now;
        now
    }

    /// Replaces every server timestamp sentinel in `document` with one
    /// reading, returned when one was taken.
    pub fn resolve(&self, document: &mut Document) -> StoreResult<Option<String>> {
        let fields = server_timestamp_fields(document);
        if fields.is_empty() {
            return Ok(None);
        }

        let stamp = format_timestamp(self.now())?;
        for field in fields {
            document.insert(field, Value::String(stamp.clone()));
        }
        Ok(Some(stamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_recognized() {
        assert!(is_server_timestamp(&server_timestamp()));
        assert!(!is_server_timestamp(&json!("timestamp")));
        assert!(!is_server_timestamp(&json!({ ".sv": "timestamp", "extra": 1 })));
    }

    #[test]
    fn clock_is_strictly_increasing() {
        let clock = ServerClock::default();
        let mut previous = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn formatted_timestamps_sort_like_time() {
        let early = OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_100_000_000).unwrap();
        let late = OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_900_000_000).unwrap();
        let early = format_timestamp(early).unwrap();
        let late = format_timestamp(late).unwrap();

        assert_eq!(early, "2023-11-14T22:13:20.100000000Z");
        assert!(early < late);
    }

    #[test]
    fn formatted_timestamp_parses_as_rfc3339() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let text = format_timestamp(at).unwrap();
        let parsed = OffsetDateTime::parse(&text, &time::format_description::well_known::Rfc3339).unwrap();
        assert_eq!(parsed, at);
    }

    #[test]
    fn resolve_replaces_only_sentinels() {
        let clock = ServerClock::default();
        let mut document = Document::new();
        document.insert("name".to_owned(), json!("lobby"));
        document.insert("createdAt".to_owned(), server_timestamp());

        let stamp = clock.resolve(&mut document).unwrap();

        assert_eq!(document["name"], json!("lobby"));
        assert!(document["createdAt"].as_str().is_some_and(|s| s.ends_with('Z')));
        assert_eq!(stamp.as_deref(), document["createdAt"].as_str());

        let mut plain = Document::new();
        plain.insert("name".to_owned(), json!("lobby"));
        assert_eq!(clock.resolve(&mut plain).unwrap(), None);
    }

    #[test]
    fn seeded_clock_reads_past_its_seed() {
        let seed = OffsetDateTime::now_utc() + time::Duration::days(365);
        let clock = ServerClock::starting_after(seed);
        assert!(clock.now() > seed);
        assert!(clock.now() > seed);
    }

    #[test]
    fn auto_ids_have_firestore_shape() {
        let id = auto_id();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, auto_id());
    }
}
