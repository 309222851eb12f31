use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub track_id: String,
    pub track_name: String,
    pub artist_names: String,
    pub album_art: Option<String>,
    pub preview_url: Option<String>,
    pub caption: Option<String>,
    pub likes: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A post as shown in a feed, from the viewer's point of view.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub track_id: String,
    pub track_name: String,
    pub artist_names: String,
    pub album_art: Option<String>,
    pub preview_url: Option<String>,
    pub caption: Option<String>,
    pub likes: i32,
    pub comment_count: i64,
    pub liked_by_me: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Outcome of a conditional like/unlike write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    /// The edge changed; carries the post's new like count.
    Applied(i32),
    /// Nothing to do: already liked (like) or not liked (unlike).
    Unchanged,
    PostMissing,
}
