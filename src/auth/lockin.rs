use axum::{debug_handler, extract::{Path, Query, State}, response::{IntoResponse, Redirect}};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{guard::HOME, session::{self, Identity, CSRF_STATE, PKCE_VERIFIER}, AppResult, AppState, GetField};

use super::{clients::ClientProvider, Clients};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FirebaseRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

/// OAuth callback: trades the code for a provider token, signs in to
/// Firebase with it and stores the resulting identity in the session.
#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(LockinQuery { state, code }): Query<LockinQuery>,
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let state = CsrfToken::new(state.ok_or("OAuth: without state")?);
    let code = AuthorizationCode::new(code.ok_or("OAuth: without code")?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err("no csrf_state".into());
    };

    if state.secret().as_str() != stored_state.as_str() {
        warn!(%provider, "csrf state mismatch on oauth callback");
        return Err("csrf tokens don't match".into());
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err("no pkce_verifier".into());
    };

    let client = clients.get_client(provider)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await?;

    let access_token = token_result.access_token().secret();
    let body: Value = http_client.post(&clients.idp_url)
        .json(&FirebaseRequest {
            post_body: format!("access_token={access_token}&providerId={}", provider.id()),
            request_uri: "http://localhost/".to_owned(),
            return_idp_credential: true,
            return_secure_token: true,
        })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let identity = identity_from_idp(&body)?;
    info!(uid = %identity.uid, %provider, "signed in");
    session::sign_in(&session, identity).await?;

    Ok(Redirect::to(HOME))
}

fn identity_from_idp(body: &Value) -> AppResult<Identity> {
    let uid = body.get_str_field("localId")?;
    if uid.is_empty() {
        return Err("identity toolkit returned an empty localId".into());
    }
    let display_name = body.get_str_field("displayName").ok();
    Ok(Identity::new(uid, display_name))
}
