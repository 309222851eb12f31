use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{Artist, MusicApi, MusicError, MusicProfile, TokenGrant, Track};

/// Canned music provider that counts token refreshes.
#[derive(Default)]
pub struct FakeMusic {
    refresh_calls: AtomicUsize,
    refresh_delay: Duration,
    fail_refresh: bool,
    fail_top_tracks: AtomicBool,
}

impl FakeMusic {
    pub fn with_refresh_delay(delay: Duration) -> Self {
        Self {
            refresh_delay: delay,
            ..Self::default()
        }
    }

    pub fn failing_refresh() -> Self {
        Self {
            fail_refresh: true,
            ..Self::default()
        }
    }

    pub fn fail_top_tracks(&self) {
        self.fail_top_tracks.store(true, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> MusicError {
        MusicError::Status {
            status: 503,
            body: "unavailable".into(),
        }
    }

    pub fn track_named(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Track {id}"),
            artists: vec!["The Fakes".into()],
            album_art: Some(format!("https://img.test/{id}.jpg")),
            preview_url: None,
        }
    }
}

#[async_trait]
impl MusicApi for FakeMusic {
    fn authorize_url(&self, state: &str) -> Result<String, MusicError> {
        Ok(format!("https://accounts.test/authorize?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, MusicError> {
        Ok(TokenGrant {
            access_token: format!("access-for-{code}"),
            token_type: Some("Bearer".into()),
            expires_in: 3600,
            refresh_token: Some(format!("refresh-for-{code}")),
            scope: None,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, MusicError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        if self.fail_refresh {
            return Err(Self::unavailable());
        }
        Ok(TokenGrant {
            access_token: format!("access-{n}"),
            token_type: Some("Bearer".into()),
            expires_in: 3600,
            refresh_token: None,
            scope: None,
        })
    }

    async fn track(&self, _access_token: &str, track_id: &str) -> Result<Track, MusicError> {
        if track_id == "missing" {
            return Err(MusicError::NotFound);
        }
        Ok(Self::track_named(track_id))
    }

    async fn current_user(&self, _access_token: &str) -> Result<MusicProfile, MusicError> {
        Ok(MusicProfile {
            id: "fake-user".into(),
            display_name: Some("Fake User".into()),
            email: None,
            picture: Some("https://img.test/me.jpg".into()),
        })
    }

    async fn top_tracks(&self, _access_token: &str, limit: u8) -> Result<Vec<Track>, MusicError> {
        if self.fail_top_tracks.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok((0..limit.min(3))
            .map(|i| Self::track_named(&format!("top{i}")))
            .collect())
    }

    async fn top_artists(
        &self,
        _access_token: &str,
        limit: u8,
    ) -> Result<Vec<Artist>, MusicError> {
        Ok((0..limit.min(3))
            .map(|i| Artist {
                id: format!("artist{i}"),
                name: format!("Artist {i}"),
                image: None,
                genres: vec![],
            })
            .collect())
    }
}
