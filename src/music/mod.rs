mod client;
mod dto;
#[cfg(test)]
pub(crate) mod fake;
mod tokens;

pub use client::{MusicApi, MusicError, SpotifyClient};
pub use dto::{Artist, MusicProfile, TokenGrant, Track};
pub use tokens::{TokenError, TokenManager};
