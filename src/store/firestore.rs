//! Cloud Firestore over its REST API.
//!
//! Inserts go through `documents:commit` so that server timestamp sentinels
//! become `REQUEST_TIME` transforms evaluated by Firestore itself. Ordered
//! scans are a single-collection `documents:runQuery`.

use async_trait::async_trait;
use serde_json::{json, Map, Number, Value};
use tracing::debug;

use super::{auto_id, server_timestamp_fields, Direction, Document, DocumentStore, StoreError, StoreResult};

const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

#[derive(Debug, Clone)]
pub struct FirestoreStore {
    http_client: reqwest::Client,
    base_url: String,
    project_id: String,
    api_key: String,
}

impl FirestoreStore {
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_base_url(FIRESTORE_URL, project_id, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            project_id: project_id.into(),
            api_key: api_key.into(),
        }
    }

    fn database(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}/documents:{method}", self.base_url, self.database())
    }

    async fn post(&self, method: &str, body: &Value) -> StoreResult<Value> {
        let response = self
            .http_client
            .post(self.endpoint(method))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status: status.as_u16(), body });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<String> {
        let id = auto_id();
        let name = format!("{}/documents/{collection}/{id}", self.database());
        let body = commit_body(&name, document);

        self.post("commit", &body).await?;
        debug!(collection, id = %id, "firestore commit accepted");
        Ok(id)
    }

    async fn ordered_scan(
        &self,
        collection: &str,
        field: &str,
        direction: Direction,
    ) -> StoreResult<Vec<(String, Document)>> {
        let body = run_query_body(collection, field, direction);
        let response = self.post("runQuery", &body).await?;
        parse_run_query(&response)
    }
}

/// A create-only write, with sentinels moved into server transforms.
fn commit_body(name: &str, mut document: Document) -> Value {
    let transforms: Vec<Value> = server_timestamp_fields(&document)
        .into_iter()
        .map(|field| {
            document.remove(&field);
            json!({ "fieldPath": field, "setToServerValue": "REQUEST_TIME" })
        })
        .collect();

    let fields: Map<String, Value> = document
        .into_iter()
        .map(|(key, value)| (key, to_firestore(value)))
        .collect();

    json!({
        "writes": [{
            "update": { "name": name, "fields": fields },
            "updateTransforms": transforms,
            "currentDocument": { "exists": false },
        }]
    })
}

fn run_query_body(collection: &str, field: &str, direction: Direction) -> Value {
    let direction = match direction {
        Direction::Ascending => "ASCENDING",
        Direction::Descending => "DESCENDING",
    };
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "orderBy": [{ "field": { "fieldPath": field }, "direction": direction }],
        }
    })
}

/// `runQuery` answers with a stream of results; entries without a
/// `document` only carry a read time.
fn parse_run_query(response: &Value) -> StoreResult<Vec<(String, Document)>> {
    let results = response
        .as_array()
        .ok_or_else(|| StoreError::Malformed(format!("expected array from runQuery, got {response}")))?;

    results
        .iter()
        .filter_map(|result| result.get("document"))
        .map(|document| {
            let name = document
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| StoreError::Malformed(format!("document without name: {document}")))?;
            let id = name.rsplit('/').next().unwrap_or(name).to_owned();

            let fields = match document.get("fields") {
                Some(Value::Object(fields)) => fields
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), from_firestore(value)?)))
                    .collect::<StoreResult<Document>>()?,
                Some(other) => return Err(StoreError::Malformed(format!("fields of {id} not an object: {other}"))),
                None => Document::new(),
            };
            Ok((id, fields))
        })
        .collect()
}

fn to_firestore(value: Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => json!({
            "arrayValue": { "values": values.into_iter().map(to_firestore).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => json!({
            "mapValue": {
                "fields": fields
                    .into_iter()
                    .map(|(key, value)| (key, to_firestore(value)))
                    .collect::<Map<String, Value>>()
            }
        }),
    }
}

/// Timestamps and references come back as plain strings.
fn from_firestore(value: &Value) -> StoreResult<Value> {
    let malformed = || StoreError::Malformed(format!("unsupported firestore value: {value}"));
    let obj = value.as_object().ok_or_else(malformed)?;
    let (kind, inner) = obj.iter().next().ok_or_else(malformed)?;

    Ok(match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().ok_or_else(malformed)?),
        "integerValue" => {
            let text = inner.as_str().ok_or_else(malformed)?;
            Value::Number(text.parse::<i64>().map_err(|_| malformed())?.into())
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Value::String(inner.as_str().ok_or_else(malformed)?.to_owned())
        }
        "geoPointValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(from_firestore).collect::<StoreResult<Vec<_>>>())
                .transpose()?
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(|fields| {
                    fields
                        .iter()
                        .map(|(key, value)| Ok((key.clone(), from_firestore(value)?)))
                        .collect::<StoreResult<Map<String, Value>>>()
                })
                .transpose()?
                .unwrap_or_default(),
        ),
        _ => return Err(malformed()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::server_timestamp;

    #[test]
    fn commit_moves_sentinel_into_transform() {
        let mut document = Document::new();
        document.insert("name".to_owned(), json!("Team Chat"));
        document.insert("members".to_owned(), json!(["u1"]));
        document.insert("createdAt".to_owned(), server_timestamp());

        let body = commit_body("projects/p/databases/(default)/documents/rooms/abc", document);
        let write = &body["writes"][0];

        assert_eq!(write["update"]["name"], "projects/p/databases/(default)/documents/rooms/abc");
        assert_eq!(write["update"]["fields"]["name"], json!({ "stringValue": "Team Chat" }));
        assert_eq!(
            write["update"]["fields"]["members"],
            json!({ "arrayValue": { "values": [{ "stringValue": "u1" }] } })
        );
        assert!(write["update"]["fields"].get("createdAt").is_none());
        assert_eq!(
            write["updateTransforms"],
            json!([{ "fieldPath": "createdAt", "setToServerValue": "REQUEST_TIME" }])
        );
        assert_eq!(write["currentDocument"]["exists"], json!(false));
    }

    #[test]
    fn run_query_orders_by_field() {
        let body = run_query_body("rooms", "createdAt", Direction::Descending);
        assert_eq!(body["structuredQuery"]["from"][0]["collectionId"], "rooms");
        assert_eq!(body["structuredQuery"]["orderBy"][0]["field"]["fieldPath"], "createdAt");
        assert_eq!(body["structuredQuery"]["orderBy"][0]["direction"], "DESCENDING");
    }

    #[test]
    fn empty_run_query_has_only_read_time() {
        let response = json!([{ "readTime": "2024-01-01T00:00:00Z" }]);
        assert!(parse_run_query(&response).unwrap().is_empty());
    }

    #[test]
    fn run_query_documents_are_decoded() {
        let response = json!([
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/rooms/r2",
                    "fields": {
                        "name": { "stringValue": "second" },
                        "createdAt": { "timestampValue": "2024-01-02T00:00:00.000000Z" },
                        "members": { "arrayValue": { "values": [{ "stringValue": "u1" }] } },
                        "count": { "integerValue": "3" }
                    }
                },
                "readTime": "2024-01-03T00:00:00Z"
            },
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/rooms/r1",
                    "fields": { "members": { "arrayValue": {} } }
                }
            }
        ]);

        let rows = parse_run_query(&response).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "r2");
        assert_eq!(rows[0].1["name"], json!("second"));
        assert_eq!(rows[0].1["createdAt"], json!("2024-01-02T00:00:00.000000Z"));
        assert_eq!(rows[0].1["members"], json!(["u1"]));
        assert_eq!(rows[0].1["count"], json!(3));
        assert_eq!(rows[1].0, "r1");
        assert_eq!(rows[1].1["members"], json!([]));
    }

    #[test]
    fn nested_values_survive_conversion() {
        let value = json!({ "a": [1, 2.5, null, true], "b": { "c": "d" } });
        assert_eq!(from_firestore(&to_firestore(value.clone())).unwrap(), value);
    }

    #[test]
    fn unknown_value_kind_is_malformed() {
        let err = from_firestore(&json!({ "mysteryValue": 1 })).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn non_array_response_is_malformed() {
        assert!(parse_run_query(&json!({ "error": "nope" })).is_err());
    }

    #[test]
    fn endpoints_address_default_database() {
        let store = FirestoreStore::with_base_url("http://localhost:8081/v1", "demo", "key");
        assert_eq!(
            store.endpoint("runQuery"),
            "http://localhost:8081/v1/projects/demo/databases/(default)/documents:runQuery"
        );
    }
}
