//! Post-login profile sync: pulls the user's music profile into the
//! denormalized columns of their user row.
//!
//! Steps run in order and each failure names the step it came from, so the
//! caller can tell the user what went wrong without any partial snapshot being
//! written (only the last step writes).

use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    music::{Artist, Track},
    state::AppState,
};

pub const TOP_LIMIT: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    AccessToken,
    TopTracks,
    TopArtists,
    Profile,
    Persist,
}

impl SyncStep {
    pub fn user_message(self) -> &'static str {
        match self {
            SyncStep::AccessToken => "Could not connect to your music account. Please log in again.",
            SyncStep::TopTracks => "Could not load your top tracks.",
            SyncStep::TopArtists => "Could not load your top artists.",
            SyncStep::Profile => "Could not load your music profile.",
            SyncStep::Persist => "Could not save your music profile.",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("profile sync failed at {step:?}: {source}")]
pub struct SyncError {
    pub step: SyncStep,
    #[source]
    pub source: anyhow::Error,
}

fn at<E: Into<anyhow::Error>>(step: SyncStep) -> impl FnOnce(E) -> SyncError {
    move |e| SyncError {
        step,
        source: e.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub picture: Option<String>,
    pub top_tracks: Vec<Track>,
    pub top_artists: Vec<Artist>,
}

/// Fetch everything the snapshot needs, stopping at the first failure.
pub async fn fetch_snapshot(
    state: &AppState,
    session_id: &str,
) -> Result<ProfileSnapshot, SyncError> {
    let token = state
        .tokens
        .access_token(session_id)
        .await
        .map_err(at(SyncStep::AccessToken))?;
    let top_tracks = state
        .music
        .top_tracks(&token, TOP_LIMIT)
        .await
        .map_err(at(SyncStep::TopTracks))?;
    let top_artists = state
        .music
        .top_artists(&token, TOP_LIMIT)
        .await
        .map_err(at(SyncStep::TopArtists))?;
    let profile = state
        .music
        .current_user(&token)
        .await
        .map_err(at(SyncStep::Profile))?;

    Ok(ProfileSnapshot {
        picture: profile.picture,
        top_tracks,
        top_artists,
    })
}

/// Run the whole chain and write the snapshot, plus the session's current
/// refresh token, to the user row.
#[instrument(skip(state, session_id))]
pub async fn sync_profile(
    state: &AppState,
    session_id: &str,
    user_id: Uuid,
) -> Result<ProfileSnapshot, SyncError> {
    let snapshot = fetch_snapshot(state, session_id).await?;

    let refresh_token = state
        .sessions
        .load(session_id)
        .await
        .map_err(at(SyncStep::Persist))?
        .and_then(|s| s.refresh_token);

    User::store_snapshot(
        &state.db,
        user_id,
        snapshot.picture.as_deref(),
        &snapshot.top_tracks,
        &snapshot.top_artists,
        refresh_token.as_deref(),
    )
    .await
    .map_err(at(SyncStep::Persist))?;

    info!(
        %user_id,
        tracks = snapshot.top_tracks.len(),
        artists = snapshot.top_artists.len(),
        "profile synced"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        music::fake::FakeMusic,
        session::{SessionIdentity, SessionRecord},
    };

    async fn session(state: &AppState, refresh: Option<&str>) -> SessionRecord {
        let rec = SessionRecord::new(
            SessionIdentity {
                user_id: Uuid::new_v4(),
                username: "alice".into(),
                email: "a@x.com".into(),
            },
            refresh.map(str::to_string),
            time::Duration::hours(1),
        );
        state.sessions.save(&rec).await.unwrap();
        rec
    }

    #[tokio::test]
    async fn fetches_all_parts_with_one_refresh() {
        let music = Arc::new(FakeMusic::default());
        let state = AppState::fake_with(music.clone());
        let rec = session(&state, Some("r")).await;

        let snap = fetch_snapshot(&state, &rec.id).await.unwrap();
        assert_eq!(snap.top_tracks.len(), 3);
        assert_eq!(snap.top_artists.len(), 3);
        assert_eq!(snap.picture.as_deref(), Some("https://img.test/me.jpg"));
        assert_eq!(music.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn unlinked_session_fails_at_token_step() {
        let state = AppState::fake();
        let rec = session(&state, None).await;

        let err = fetch_snapshot(&state, &rec.id).await.unwrap_err();
        assert_eq!(err.step, SyncStep::AccessToken);
    }

    #[tokio::test]
    async fn stops_at_failing_step() {
        let music = Arc::new(FakeMusic::default());
        music.fail_top_tracks();
        let state = AppState::fake_with(music);
        let rec = session(&state, Some("r")).await;

        let err = sync_profile(&state, &rec.id, rec.identity.user_id)
            .await
            .unwrap_err();
        assert_eq!(err.step, SyncStep::TopTracks);
        assert_eq!(err.step.user_message(), "Could not load your top tracks.");
    }
}
