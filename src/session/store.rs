use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::SessionRecord;

/// Key/value store for sessions, keyed by the opaque session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> anyhow::Result<Option<SessionRecord>>;
    async fn save(&self, record: &SessionRecord) -> anyhow::Result<()>;
    /// Overwrite an existing session. Returns `false`, writing nothing, when
    /// the id is no longer stored.
    async fn update(&self, record: &SessionRecord) -> anyhow::Result<bool>;
    /// Removing an unknown id is not an error.
    async fn destroy(&self, id: &str) -> anyhow::Result<()>;
    async fn destroy_for_user(&self, user_id: Uuid) -> anyhow::Result<u64>;
    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: &str) -> anyhow::Result<Option<SessionRecord>> {
        let row = sqlx::query_scalar::<_, Json<SessionRecord>>(
            r#"SELECT data FROM sessions WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("load session")?;
        Ok(row.map(|Json(record)| record))
    }

    async fn save(&self, record: &SessionRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, data, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
               SET data = EXCLUDED.data,
                   expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&record.id)
        .bind(record.identity.user_id)
        .bind(Json(record))
        .bind(record.expires_at)
        .execute(&self.db)
        .await
        .context("save session")?;
        Ok(())
    }

    async fn update(&self, record: &SessionRecord) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"UPDATE sessions SET data = $2, expires_at = $3 WHERE id = $1"#,
        )
        .bind(&record.id)
        .bind(Json(record))
        .bind(record.expires_at)
        .execute(&self.db)
        .await
        .context("update session")?;
        Ok(res.rows_affected() == 1)
    }

    async fn destroy(&self, id: &str) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM sessions WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .context("destroy session")?;
        Ok(())
    }

    async fn destroy_for_user(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query(r#"DELETE FROM sessions WHERE user_id = $1"#)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("destroy user sessions")?;
        Ok(res.rows_affected())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let res = sqlx::query(r#"DELETE FROM sessions WHERE expires_at <= $1"#)
            .bind(now)
            .execute(&self.db)
            .await
            .context("purge expired sessions")?;
        Ok(res.rows_affected())
    }
}

/// In-process store; sessions are lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> anyhow::Result<Option<SessionRecord>> {
        Ok(self.inner.read().await.get(id).cloned())
    }

    async fn save(&self, record: &SessionRecord) -> anyhow::Result<()> {
        self.inner
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &SessionRecord) -> anyhow::Result<bool> {
        let mut map = self.inner.write().await;
        match map.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn destroy(&self, id: &str) -> anyhow::Result<()> {
        self.inner.write().await.remove(id);
        Ok(())
    }

    async fn destroy_for_user(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, s| s.identity.user_id != user_id);
        Ok((before - map.len()) as u64)
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> anyhow::Result<u64> {
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, s| !s.is_expired(now));
        Ok((before - map.len()) as u64)
    }
}
