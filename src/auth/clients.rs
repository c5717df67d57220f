use std::fmt;

use oauth2::{basic::BasicClient, AuthUrl, Client, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use serde::Deserialize;
use serde_json::Value;

use crate::{AppResult, GetField};

type HappyClient = Client<oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>, oauth2::StandardTokenResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardTokenIntrospectionResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardRevocableToken, oauth2::StandardErrorResponse<oauth2::RevocationErrorResponseType>, oauth2::EndpointSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointSet>;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signInWithIdp";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientProvider {
    Google,
    Github,
}

impl ClientProvider {
    /// Provider id understood by the Firebase identity toolkit.
    pub fn id(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google.com",
            Github => "github.com",
        }
    }

    fn slug(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google",
            Github => "github",
        }
    }

    fn endpoints(&self) -> (&'static str, &'static str) {
        use ClientProvider::*;
        match self {
            Google => ("https://accounts.google.com/o/oauth2/auth", "https://oauth2.googleapis.com/token"),
            Github => ("https://github.com/login/oauth/authorize", "https://github.com/login/oauth/access_token"),
        }
    }
}

impl fmt::Display for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Firebase project credentials, shared by sign-in and the Firestore store.
#[derive(Debug, Clone)]
pub struct Firebase {
    pub api_key: String,
    pub project_id: Option<String>,
}

#[derive(Clone)]
pub struct Clients {
    pub(crate) firebase: Firebase,
    pub(crate) idp_url: String,
    google_client: Option<HappyClient>,
    github_client: Option<HappyClient>,
}

impl Clients {
    /// Reads the client secret file layout:
    /// `{"firebase": {"apikey", "project_id"?}, "google"?: {..}, "github"?: {..}}`.
    pub fn from_json(json: Value, public_url: &str) -> AppResult<Clients> {
        let firebase_json = json.get_obj_field("firebase")?;
        let firebase = Firebase {
            api_key: firebase_json.get_str_field("apikey")?,
            project_id: firebase_json.get_str_field("project_id").ok(),
        };
        let idp_url = format!("{IDENTITY_TOOLKIT_URL}?key={}", firebase.api_key);

        let google_client = json
            .get("google")
            .map(|json| basic_client(json, ClientProvider::Google, public_url))
            .transpose()?;
        let github_client = json
            .get("github")
            .map(|json| basic_client(json, ClientProvider::Github, public_url))
            .transpose()?;

        Ok(
            Clients {
                firebase,
                idp_url,
                google_client,
                github_client,
            }
        )
    }

    pub fn firebase(&self) -> &Firebase {
        &self.firebase
    }

    pub fn get_client(&self, provider: ClientProvider) -> AppResult<HappyClient> {
        use ClientProvider::*;
        match provider {
            Google => self.google_client.clone(),
            Github => self.github_client.clone(),
        }.ok_or(format!("OAuth provider {provider} keys not supplied").into())
    }
}

fn basic_client(json: &Value, provider: ClientProvider, public_url: &str) -> AppResult<HappyClient> {
    let client_id = ClientId::new(json.get_str_field("client_id")?);
    let client_secret = ClientSecret::new(json.get_str_field("client_secret")?);

    let (auth_url, token_url) = provider.endpoints();
    let auth_url = AuthUrl::new(auth_url.to_owned())?;
    let token_url = TokenUrl::new(token_url.to_owned())?;
    let redirect_url = RedirectUrl::new(format!(
        "{}/lockin/{}",
        public_url.trim_end_matches('/'),
        provider.slug()
    ))?;

    Ok(
        BasicClient::new(client_id)
        .set_client_secret(client_secret)
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url)
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_firebase_and_configured_providers() {
        let clients = Clients::from_json(
            json!({
                "firebase": { "apikey": "k123", "project_id": "chat" },
                "google": { "client_id": "gid", "client_secret": "gsecret" }
            }),
            "http://localhost:8080/",
        )
        .unwrap();

        assert_eq!(clients.firebase().api_key, "k123");
        assert_eq!(clients.firebase().project_id.as_deref(), Some("chat"));
        assert!(clients.idp_url.ends_with("accounts:signInWithIdp?key=k123"));

        let google = clients.get_client(ClientProvider::Google).unwrap();
        assert_eq!(
            google.redirect_uri().map(|url| url.as_str().to_owned()),
            Some("http://localhost:8080/lockin/google".to_owned())
        );
    }

    #[test]
    fn missing_provider_is_an_error() {
        let clients = Clients::from_json(json!({ "firebase": { "apikey": "k" } }), "http://localhost:8080").unwrap();
        let err = clients.get_client(ClientProvider::Github).err().unwrap();
        assert!(err.0.to_string().contains("Github"));
    }

    #[test]
    fn firebase_section_is_required() {
        assert!(Clients::from_json(json!({ "google": {} }), "http://localhost:8080").is_err());
    }

    #[test]
    fn provider_parses_from_path_segment() {
        let provider: ClientProvider = serde_json::from_value(json!("github")).unwrap();
        assert_eq!(provider, ClientProvider::Github);
        assert_eq!(provider.id(), "github.com");
    }
}
