use std::{cmp::Ordering, collections::HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{auto_id, Direction, Document, DocumentStore, ServerClock, StoreResult};

/// Process-local store. Documents keep their insertion order, which breaks
/// ties in ordered scans.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<(String, Document)>>>,
    clock: ServerClock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, mut document: Document) -> StoreResult<String> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_owned()).or_default();

        let id = loop {
            let id = auto_id();
            if !entries.iter().any(|(existing, _)| *existing == id) {
                break id;
            }
        };

        self.clock.resolve(&mut document)?;
        entries.push((id.clone(), document));
        Ok(id)
    }

    async fn ordered_scan(
        &self,
        collection: &str,
        field: &str,
        direction: Direction,
    ) -> StoreResult<Vec<(String, Document)>> {
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut entries = entries.clone();
        // stable sort: equal keys stay in insertion order, then the whole run flips
        entries.sort_by(|(_, a), (_, b)| compare_values(a.get(field), b.get(field)));
        if direction == Direction::Descending {
            entries.reverse();
        }
        Ok(entries)
    }
}

/// Missing fields sort first, then nulls, booleans, numbers, strings.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Object(_)) => 6,
        }
    }

    match (a, b) {
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.total_cmp(&b)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::server_timestamp;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn scan_of_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        let rows = store.ordered_scan("rooms", "createdAt", Direction::Descending).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn insert_resolves_server_timestamp() {
        let store = MemoryStore::new();
        let id = store
            .insert("rooms", doc(json!({ "name": "a", "createdAt": server_timestamp() })))
            .await
            .unwrap();

        let rows = store.ordered_scan("rooms", "createdAt", Direction::Ascending).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, id);
        assert!(rows[0].1["createdAt"].is_string());
        assert_eq!(store.len("rooms").await, 1);
    }

    #[tokio::test]
    async fn scan_orders_by_field_in_both_directions() {
        let store = MemoryStore::new();
        for n in [2, 3, 1] {
            store.insert("numbers", doc(json!({ "n": n }))).await.unwrap();
        }

        let ascending: Vec<_> = store
            .ordered_scan("numbers", "n", Direction::Ascending)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, d)| d["n"].as_i64().unwrap())
            .collect();
        let descending: Vec<_> = store
            .ordered_scan("numbers", "n", Direction::Descending)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, d)| d["n"].as_i64().unwrap())
            .collect();

        assert_eq!(ascending, vec![1, 2, 3]);
        assert_eq!(descending, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn collections_are_separate() {
        let store = MemoryStore::new();
        store.insert("rooms", doc(json!({ "name": "a" }))).await.unwrap();
        assert_eq!(store.len("rooms").await, 1);
        assert_eq!(store.len("users").await, 0);
    }
}
