use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{debug, info};

use super::{auto_id, Direction, Document, DocumentStore, ServerClock, StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    PRIMARY KEY (collection, id)
)"#;

// latest server timestamp handed out, so a reopened store keeps counting up
const CLOCK_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS server_clock (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    last TEXT NOT NULL
)"#;

/// Documents kept as JSON text in a single SQLite table.
#[derive(Debug)]
pub struct SqliteStore {
    db_pool: SqlitePool,
    clock: ServerClock,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let db_pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?;

        info!(url, "connected to sqlite document store");
        Self::with_pool(db_pool).await
    }

    pub async fn with_pool(db_pool: SqlitePool) -> StoreResult<Self> {
        sqlx::query(SCHEMA).execute(&db_pool).await?;
        sqlx::query(CLOCK_SCHEMA).execute(&db_pool).await?;

        let last: Option<String> = sqlx::query_scalar("SELECT last FROM server_clock WHERE id=0")
            .fetch_optional(&db_pool)
            .await?;
        let clock = match last {
            Some(last) => {
                let at = OffsetDateTime::parse(&last, &Rfc3339)
                    .map_err(|e| StoreError::Malformed(format!("stored clock {last:?}: {e}")))?;
                debug!(last = %last, "resuming server clock");
                ServerClock::starting_after(at)
            }
            None => ServerClock::default(),
        };

        Ok(Self { db_pool, clock })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, collection: &str, mut document: Document) -> StoreResult<String> {
        let stamp = self.clock.resolve(&mut document)?;
        let data = serde_json::to_string(&document)?;

        let mut tx = self.db_pool.begin().await?;
        let id = loop {
            let id = auto_id();
            let result = sqlx::query("INSERT OR IGNORE INTO documents (collection,id,data) VALUES (?,?,?)")
                .bind(collection)
                .bind(&id)
                .bind(&data)
                .execute(&mut *tx)
                .await?;

            // zero rows means the id was taken
            if result.rows_affected() == 1 {
                break id;
            }
        };

        if let Some(stamp) = stamp {
            sqlx::query(
                "INSERT INTO server_clock (id,last) VALUES (0,?) \
                 ON CONFLICT(id) DO UPDATE SET last=excluded.last WHERE excluded.last > server_clock.last",
            )
            .bind(stamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn ordered_scan(
        &self,
        collection: &str,
        field: &str,
        direction: Direction,
    ) -> StoreResult<Vec<(String, Document)>> {
        let order = match direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        let sql = format!(
            "SELECT id,data FROM documents WHERE collection=? ORDER BY json_extract(data, ?) {order}, rowid {order}"
        );

        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(collection)
            .bind(json_path(field))
            .fetch_all(&self.db_pool)
            .await?;

        rows.into_iter()
            .map(|(id, data)| match serde_json::from_str(&data)? {
                Value::Object(document) => Ok((id, document)),
                other => Err(StoreError::Malformed(format!("document {id} is not an object: {other}"))),
            })
            .collect()
    }
}

/// JSON path selecting a top-level key, quoted so any key is addressable.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}
