use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{auth::repo_types::User, music::TokenGrant};

const SESSION_ID_LEN: usize = 48;
/// Upper bound on a grant's lifetime; provider values beyond it are clamped.
const MAX_GRANT_SECS: i64 = 86_400;

/// Copy of the authenticated user's identity held by a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for SessionIdentity {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
        }
    }
}

/// Server-side session, referenced by the opaque id in the client's cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub identity: SessionIdentity,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub access_expires_at: Option<OffsetDateTime>,
    /// Nonce sent as `state` on the authorize redirect.
    pub oauth_state: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl SessionRecord {
    pub fn new(identity: SessionIdentity, refresh_token: Option<String>, ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: random_token(SESSION_ID_LEN),
            identity,
            access_token: None,
            refresh_token,
            access_expires_at: None,
            oauth_state: None,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// The cached access token, if there is one and it has not expired.
    pub fn cached_access_token(&self, now: OffsetDateTime) -> Option<&str> {
        match (&self.access_token, self.access_expires_at) {
            (Some(token), Some(exp)) if now < exp => Some(token.as_str()),
            _ => None,
        }
    }

    pub fn apply_grant(&mut self, grant: &TokenGrant, now: OffsetDateTime) {
        self.access_token = Some(grant.access_token.clone());
        let lifetime = grant.expires_in.clamp(0, MAX_GRANT_SECS);
        self.access_expires_at = Some(now + Duration::seconds(lifetime));
        if let Some(rotated) = &grant.refresh_token {
            self.refresh_token = Some(rotated.clone());
        }
    }
}

pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
