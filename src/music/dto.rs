use serde::{Deserialize, Serialize};

/// Result of an authorization-code or refresh-token exchange.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: i64,
    /// Only present when the provider issues (or rotates) a refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album_art: Option<String>,
    pub preview_url: Option<String>,
}

impl Track {
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub genres: Vec<String>,
}

/// The provider-side account of the current token holder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MusicProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

// ---- wire shapes ----

#[derive(Debug, Deserialize)]
pub(super) struct RawImage {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawArtistRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawAlbum {
    #[serde(default)]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawTrack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<RawArtistRef>,
    pub album: Option<RawAlbum>,
    pub preview_url: Option<String>,
}

impl From<RawTrack> for Track {
    fn from(r: RawTrack) -> Self {
        Self {
            id: r.id,
            name: r.name,
            artists: r.artists.into_iter().map(|a| a.name).collect(),
            album_art: r
                .album
                .and_then(|a| a.images.into_iter().next())
                .map(|i| i.url),
            preview_url: r.preview_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RawArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<RawImage>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl From<RawArtist> for Artist {
    fn from(r: RawArtist) -> Self {
        Self {
            id: r.id,
            name: r.name,
            image: r.images.into_iter().next().map(|i| i.url),
            genres: r.genres,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RawProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub images: Vec<RawImage>,
}

impl From<RawProfile> for MusicProfile {
    fn from(r: RawProfile) -> Self {
        Self {
            id: r.id,
            display_name: r.display_name,
            email: r.email,
            picture: r.images.into_iter().next().map(|i| i.url),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct Paged<T> {
    pub items: Vec<T>,
}
