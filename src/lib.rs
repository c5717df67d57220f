pub mod appresult;
pub mod auth;
pub mod config;
pub mod guard;
pub mod index;
pub mod res;
pub mod rooms;
pub mod session;
pub mod store;

use std::sync::Arc;

use axum::{extract::FromRef, middleware, routing::get, Router};
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult};
use guard::RouteTable;
use store::DocumentStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub clients: auth::Clients,
    pub routes: Arc<RouteTable>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, clients: auth::Clients) -> Self {
        Self {
            store,
            clients,
            routes: Arc::new(guard::route_table()),
        }
    }
}

/// The whole application: views, auth flow and JSON API behind the route
/// guard, inside the session layer.
pub fn app(app_state: AppState, session_layer: SessionManagerLayer<MemoryStore>) -> Router {
    let guard = middleware::from_fn_with_state(app_state.routes.clone(), guard::require_auth);

    Router::new()
        .route(guard::HOME, get(index::index).post(rooms::new_room))
        .merge(auth::router())
        .merge(rooms::router())
        .nest("/api", rooms::api_router().layer(CorsLayer::permissive()))
        .with_state(app_state)
        .layer(guard)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_obj_field(&self, field: &str) -> AppResult<&Value>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or(format!("expected {field} in {self}"))?
            .as_str()
            .ok_or(format!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> AppResult<&Value> {
        self.get(field)
        .ok_or(format!("expected {field} in {self}").into())
    }
}
