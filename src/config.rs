use std::{fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{anyhow, bail, Context};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite { url: String },
    Firestore,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub public_url: String,
    pub store: StoreBackend,
    pub client_secret_path: PathBuf,
    pub session_inactivity: time::Duration,
}

impl Config {
    /// Reads the process environment, honoring a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store = match try_load::<String>(&lookup, "STORE_BACKEND", "sqlite")?.to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "sqlite" => StoreBackend::Sqlite {
                url: try_load(&lookup, "DATABASE_URL", "sqlite://chatrooms.db")?,
            },
            "firestore" => StoreBackend::Firestore,
            other => bail!("STORE_BACKEND must be memory, sqlite or firestore, not {other:?}"),
        };

        let minutes: i64 = try_load(&lookup, "SESSION_INACTIVITY_MINUTES", "60")?;
        if minutes <= 0 {
            bail!("SESSION_INACTIVITY_MINUTES must be positive, got {minutes}");
        }

        Ok(Self {
            bind_addr: try_load(&lookup, "BIND_ADDR", "0.0.0.0:8080")?,
            public_url: try_load(&lookup, "PUBLIC_URL", "http://localhost:8080")?,
            store,
            client_secret_path: try_load(&lookup, "CLIENT_SECRET_PATH", "client_secret.json")?,
            session_inactivity: time::Duration::minutes(minutes),
        })
    }

    /// Session cookies are only marked secure when served over https.
    pub fn secure_cookies(&self) -> bool {
        self.public_url.starts_with("https://")
    }

    pub fn read_client_secret(&self) -> anyhow::Result<serde_json::Value> {
        let path = &self.client_secret_path;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading client secret {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing client secret {}", path.display()))
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow!("invalid {key} value: {e}"))
}
