use std::sync::Arc;

use anyhow::Context;
use chatrooms::{
    app, auth,
    config::{Config, StoreBackend},
    session,
    store::{DocumentStore, FirestoreStore, MemoryStore, SqliteStore},
    AppState,
};
use tower_sessions::MemoryStore as SessionStore;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let clients = auth::Clients::from_json(config.read_client_secret()?, &config.public_url)
        .map_err(|err| err.0)?;

    let store: Arc<dyn DocumentStore> = match &config.store {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Sqlite { url } => Arc::new(SqliteStore::connect(url).await?),
        StoreBackend::Firestore => {
            let firebase = clients.firebase();
            let project_id = firebase
                .project_id
                .clone()
                .context("firebase.project_id is required for the firestore backend")?;
            Arc::new(FirestoreStore::new(project_id, firebase.api_key.clone()))
        }
    };
    info!(backend = ?config.store, "document store ready");

    let session_layer = session::layer(SessionStore::default(), config.session_inactivity, config.secure_cookies());
    let app = app(AppState::new(store, clients), session_layer);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "chatrooms listening");
    axum::serve(listener, app).await?;
    Ok(())
}
