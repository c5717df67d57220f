//! Cookie session keys and the signed-in identity stored under them.

use serde::{Deserialize, Serialize};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, Session, SessionManagerLayer};

pub const IDENTITY: &str = "identity";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";

/// Name shown for creators whose provider supplied no display name.
pub const ANONYMOUS_NAME: &str = "Anonymous user";

/// The authenticated user behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, display_name: Option<String>) -> Self {
        Self { uid: uid.into(), display_name }
    }

    /// Display name, falling back to [`ANONYMOUS_NAME`] when missing or empty.
    pub fn name_or_anonymous(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => ANONYMOUS_NAME,
        }
    }
}

/// Reads the identity from the local session state.
pub async fn identity(session: &Session) -> Result<Option<Identity>, tower_sessions::session::Error> {
    session.get::<Identity>(IDENTITY).await
}

pub async fn sign_in(session: &Session, identity: Identity) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(IDENTITY, identity).await
}

pub fn layer(store: MemoryStore, inactivity: time::Duration, secure: bool) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(store)
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(inactivity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_display_name_is_anonymous() {
        let identity = Identity::new("u1", Some(String::new()));
        assert_eq!(identity.name_or_anonymous(), ANONYMOUS_NAME);
    }

    #[test]
    fn missing_display_name_is_anonymous() {
        let identity = Identity::new("u1", None);
        assert_eq!(identity.name_or_anonymous(), "Anonymous user");
    }

    #[test]
    fn present_display_name_is_kept() {
        let identity = Identity::new("u1", Some("Ada".to_owned()));
        assert_eq!(identity.name_or_anonymous(), "Ada");
    }
}
