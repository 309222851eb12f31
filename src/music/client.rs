use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::dto::{
    Artist, MusicProfile, Paged, RawArtist, RawProfile, RawTrack, TokenGrant, Track,
};
use crate::config::MusicConfig;

#[derive(Debug, thiserror::Error)]
pub enum MusicError {
    #[error("music api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("music api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("music api resource not found")]
    NotFound,
    #[error("invalid music api configuration: {0}")]
    Config(String),
}

/// Narrow view of the music provider used by handlers and the token manager.
#[async_trait]
pub trait MusicApi: Send + Sync {
    fn authorize_url(&self, state: &str) -> Result<String, MusicError>;
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, MusicError>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, MusicError>;
    async fn track(&self, access_token: &str, track_id: &str) -> Result<Track, MusicError>;
    async fn current_user(&self, access_token: &str) -> Result<MusicProfile, MusicError>;
    async fn top_tracks(&self, access_token: &str, limit: u8) -> Result<Vec<Track>, MusicError>;
    async fn top_artists(&self, access_token: &str, limit: u8)
        -> Result<Vec<Artist>, MusicError>;
}

/// Spotify Web API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    cfg: MusicConfig,
}

impl SpotifyClient {
    pub fn new(cfg: MusicConfig) -> Result<Self, MusicError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("tunecircle/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, cfg })
    }

    fn accounts(&self, path: &str) -> String {
        format!("{}{}", self.cfg.accounts_url.trim_end_matches('/'), path)
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.cfg.api_url.trim_end_matches('/'), path)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, MusicError> {
        let res = self
            .http
            .post(self.accounts("/api/token"))
            .basic_auth(&self.cfg.client_id, Some(&self.cfg.client_secret))
            .form(form)
            .send()
            .await?;
        decode(res).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MusicError> {
        let url = Url::parse(&self.api(path)).map_err(|e| MusicError::Config(e.to_string()))?;
        self.get_url(access_token, url, query).await
    }

    async fn get_url<T: DeserializeOwned>(
        &self,
        access_token: &str,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, MusicError> {
        debug!(path = url.path(), "music api GET");
        let res = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await?;
        decode(res).await
    }
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, MusicError> {
    let status = res.status();
    if status == StatusCode::NOT_FOUND {
        return Err(MusicError::NotFound);
    }
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        warn!(%status, "music api error response");
        return Err(MusicError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(res.json::<T>().await?)
}

#[async_trait]
impl MusicApi for SpotifyClient {
    fn authorize_url(&self, state: &str) -> Result<String, MusicError> {
        let url = Url::parse_with_params(
            &self.accounts("/authorize"),
            &[
                ("response_type", "code"),
                ("client_id", self.cfg.client_id.as_str()),
                ("scope", self.cfg.scopes.as_str()),
                ("redirect_uri", self.cfg.redirect_uri.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| MusicError::Config(e.to_string()))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, MusicError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.cfg.redirect_uri.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, MusicError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn track(&self, access_token: &str, track_id: &str) -> Result<Track, MusicError> {
        // One path segment; a `/` inside the id is percent-encoded.
        let mut url = Url::parse(&self.api("/v1/tracks"))
            .map_err(|e| MusicError::Config(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| MusicError::Config("api url cannot carry a path".into()))?
            .push(track_id);
        let raw: RawTrack = self.get_url(access_token, url, &[]).await?;
        Ok(raw.into())
    }

    async fn current_user(&self, access_token: &str) -> Result<MusicProfile, MusicError> {
        let raw: RawProfile = self.get_json(access_token, "/v1/me", &[]).await?;
        Ok(raw.into())
    }

    async fn top_tracks(&self, access_token: &str, limit: u8) -> Result<Vec<Track>, MusicError> {
        let page: Paged<RawTrack> = self
            .get_json(
                access_token,
                "/v1/me/top/tracks",
                &[("limit", limit.to_string())],
            )
            .await?;
        Ok(page.items.into_iter().map(Track::from).collect())
    }

    async fn top_artists(
        &self,
        access_token: &str,
        limit: u8,
    ) -> Result<Vec<Artist>, MusicError> {
        let page: Paged<RawArtist> = self
            .get_json(
                access_token,
                "/v1/me/top/artists",
                &[("limit", limit.to_string())],
            )
            .await?;
        Ok(page.items.into_iter().map(Artist::from).collect())
    }
}
