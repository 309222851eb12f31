use anyhow::Context;
use serde::Deserialize;

/// Where session records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_minutes: i64,
    pub secure: bool,
    pub backend: SessionBackend,
}

/// Client credentials and endpoints of the music provider.
#[derive(Debug, Clone, Deserialize)]
pub struct MusicConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub accounts_url: String,
    pub api_url: String,
    pub scopes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub music: MusicConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let backend = match std::env::var("SESSION_BACKEND").as_deref() {
            Ok("memory") => SessionBackend::Memory,
            Ok("postgres") | Err(_) => SessionBackend::Postgres,
            Ok(other) => anyhow::bail!("unknown SESSION_BACKEND {other:?}"),
        };
        let session = SessionConfig {
            cookie_name: std::env::var("SESSION_COOKIE").unwrap_or_else(|_| "sid".into()),
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
            secure: std::env::var("SESSION_SECURE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            backend,
        };

        let music = MusicConfig {
            client_id: std::env::var("MUSIC_CLIENT_ID").context("MUSIC_CLIENT_ID is not set")?,
            client_secret: std::env::var("MUSIC_CLIENT_SECRET")
                .context("MUSIC_CLIENT_SECRET is not set")?,
            redirect_uri: std::env::var("MUSIC_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:8080/callback".into()),
            accounts_url: std::env::var("MUSIC_ACCOUNTS_URL")
                .unwrap_or_else(|_| "https://accounts.spotify.com".into()),
            api_url: std::env::var("MUSIC_API_URL")
                .unwrap_or_else(|_| "https://api.spotify.com".into()),
            scopes: std::env::var("MUSIC_SCOPES")
                .unwrap_or_else(|_| "user-read-email user-read-private user-top-read".into()),
        };

        Ok(Self {
            database_url,
            session,
            music,
        })
    }
}
