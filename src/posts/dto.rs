use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_CAPTION_LEN: usize = 280;
pub const MAX_COMMENT_LEN: usize = 500;
pub const MAX_FEED: i64 = 100;

lazy_static! {
    static ref TRACK_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9]{1,64}$").unwrap();
}

/// Provider track ids are base62.
pub fn is_valid_track_id(id: &str) -> bool {
    TRACK_ID_RE.is_match(id)
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub track_id: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub post_id: Uuid,
    pub likes: i32,
    pub liked: bool,
}

/// Clamp a requested feed size into `1..=MAX_FEED`.
pub fn feed_size(amount: i64) -> i64 {
    amount.clamp(1, MAX_FEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_size_is_clamped() {
        assert_eq!(feed_size(0), 1);
        assert_eq!(feed_size(-3), 1);
        assert_eq!(feed_size(20), 20);
        assert_eq!(feed_size(10_000), MAX_FEED);
    }

    #[test]
    fn track_ids_are_base62() {
        assert!(is_valid_track_id("4uLU6hMCjMI75M1A2tKUQC"));
        assert!(!is_valid_track_id(""));
        assert!(!is_valid_track_id("../me"));
        assert!(!is_valid_track_id("abc?market=US"));
        assert!(!is_valid_track_id(&"a".repeat(65)));
    }
}
