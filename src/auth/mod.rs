use axum::{routing::get, Router};

use crate::{guard::LOGIN, AppState};

mod clients;
mod login;
mod lockin;
mod logout;

pub use clients::{ClientProvider, Clients, Firebase};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(LOGIN, get(login::login_page))
        .route("/login/{provider}", get(login::login))
        .route("/lockin/{provider}", get(lockin::lockin))
        .route("/logout", get(logout::logout))
}
