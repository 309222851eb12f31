use std::sync::Arc;

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{MusicApi, MusicError, TokenGrant};
use crate::session::{SessionRecord, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("session no longer exists")]
    SessionGone,
    #[error("no music account linked to this session")]
    NotLinked,
    #[error("token refresh failed: {0}")]
    Refresh(#[source] MusicError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Keeps each session's music-API access token valid.
///
/// Check and refresh run under a per-session lock, and the session is re-read
/// after the lock is taken, so concurrent callers on one session cause at most
/// one refresh call.
pub struct TokenManager {
    music: Arc<dyn MusicApi>,
    sessions: Arc<dyn SessionStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TokenManager {
    pub fn new(music: Arc<dyn MusicApi>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            music,
            sessions,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(session_id.to_owned()).or_default())
    }

    /// A valid access token for the session, refreshing it first if needed.
    pub async fn access_token(&self, session_id: &str) -> Result<String, TokenError> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut record = self
            .sessions
            .load(session_id)
            .await?
            .ok_or(TokenError::SessionGone)?;

        if let Some(token) = record.cached_access_token(OffsetDateTime::now_utc()) {
            debug!(user_id = %record.identity.user_id, "using cached access token");
            return Ok(token.to_owned());
        }

        let refresh_token = record.refresh_token.clone().ok_or(TokenError::NotLinked)?;
        let grant = self.music.refresh(&refresh_token).await.map_err(|e| {
            warn!(error = %e, user_id = %record.identity.user_id, "access token refresh failed");
            TokenError::Refresh(e)
        })?;

        record.apply_grant(&grant, OffsetDateTime::now_utc());
        // Logout may have destroyed the session while the refresh was in flight.
        if !self.sessions.update(&record).await? {
            debug!(user_id = %record.identity.user_id, "session ended during refresh");
            return Err(TokenError::SessionGone);
        }
        info!(
            user_id = %record.identity.user_id,
            expires_at = ?record.access_expires_at,
            "access token refreshed"
        );
        Ok(grant.access_token)
    }

    /// Store a freshly exchanged grant on the session and clear its pending
    /// OAuth state.
    pub async fn install(
        &self,
        session_id: &str,
        grant: &TokenGrant,
    ) -> Result<SessionRecord, TokenError> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;

        let mut record = self
            .sessions
            .load(session_id)
            .await?
            .ok_or(TokenError::SessionGone)?;
        record.apply_grant(grant, OffsetDateTime::now_utc());
        record.oauth_state = None;
        if !self.sessions.update(&record).await? {
            return Err(TokenError::SessionGone);
        }
        Ok(record)
    }

    /// Drop the lock entry of a destroyed session.
    pub fn forget(&self, session_id: &str) {
        self.locks.remove(session_id);
    }

    #[cfg(test)]
    pub(crate) fn tracked_sessions(&self) -> usize {
        self.locks.len()
    }
}
