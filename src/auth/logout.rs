use axum::{debug_handler, response::Redirect};
use tower_sessions::Session;

use crate::{guard::LOGIN, AppResult};

#[debug_handler]
pub(crate) async fn logout(session: Session) -> AppResult<Redirect> {
    session.flush().await?;
    Ok(Redirect::to(LOGIN))
}
