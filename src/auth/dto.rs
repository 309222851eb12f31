use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::User;
use crate::music::{Artist, Track};

/// Request body for user registration. Missing fields arrive as empty strings
/// so they get a form message instead of a decode error.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Query of the provider's redirect back to `/callback`.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Public part of a user returned to clients.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub followers: i32,
    pub following: i32,
    pub profile_picture: Option<String>,
    pub top_tracks: Vec<Track>,
    pub top_artists: Vec<Artist>,
    pub music_linked: bool,
}

impl From<User> for PublicProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            followers: u.followers,
            following: u.following,
            profile_picture: u.profile_picture,
            top_tracks: u.top_tracks.0,
            top_artists: u.top_artists.0,
            music_linked: u.music_refresh_token.is_some(),
        }
    }
}
