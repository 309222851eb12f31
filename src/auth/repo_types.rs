use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::music::{Artist, Track};

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string
    pub followers: i32,
    pub following: i32,
    pub profile_picture: Option<String>,
    pub top_tracks: Json<Vec<Track>>,
    pub top_artists: Json<Vec<Artist>>,
    #[serde(skip_serializing)]
    pub music_refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Which unique field a registration collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakenField {
    Username,
    Email,
}
