use anyhow::Context;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::auth::repo_types::{TakenField, User};
use crate::music::{Artist, Track};

const USER_COLUMNS: &str = "id, username, email, password_hash, followers, following, \
     profile_picture, top_tracks, top_artists, music_refresh_token, created_at";

impl User {
    /// Find a user by username, ignoring case.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(username) = lower($1)"
        ))
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Insert a user unless the username or email is already taken
    /// (case-insensitively). Returns `None` on a collision.
    pub async fn create_if_absent(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    /// After a failed insert, report which field collided. Only username is
    /// checked; anything else was the email.
    pub async fn taken_field(db: &PgPool, username: &str) -> anyhow::Result<TakenField> {
        let username_taken = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE lower(username) = lower($1))"#,
        )
        .bind(username)
        .fetch_one(db)
        .await
        .context("check username")?;

        Ok(if username_taken {
            TakenField::Username
        } else {
            TakenField::Email
        })
    }

    pub async fn set_refresh_token(
        db: &PgPool,
        id: Uuid,
        refresh_token: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET music_refresh_token = $2 WHERE id = $1"#)
            .bind(id)
            .bind(refresh_token)
            .execute(db)
            .await
            .context("store refresh token")?;
        Ok(())
    }

    /// Persist the denormalized music profile, and the refresh token when one
    /// is known.
    pub async fn store_snapshot(
        db: &PgPool,
        id: Uuid,
        picture: Option<&str>,
        top_tracks: &[Track],
        top_artists: &[Artist],
        refresh_token: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET profile_picture = $2,
                   top_tracks = $3,
                   top_artists = $4,
                   music_refresh_token = COALESCE($5, music_refresh_token)
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(picture)
        .bind(Json(top_tracks))
        .bind(Json(top_artists))
        .bind(refresh_token)
        .execute(db)
        .await
        .context("store profile snapshot")?;
        Ok(())
    }

    /// Delete a user, first undoing the counters its follows and likes
    /// contributed to other rows. Returns whether a row was removed.
    pub async fn delete_account(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = db.begin().await.context("begin tx")?;

        // Edge inserts take FOR KEY SHARE on this row via their foreign keys;
        // holding FOR UPDATE keeps new edges out until the cascade runs.
        let locked = sqlx::query_scalar::<_, i32>(r#"SELECT 1 FROM users WHERE id = $1 FOR UPDATE"#)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("lock user")?;
        if locked.is_none() {
            tx.commit().await.context("commit tx")?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE users SET followers = followers - 1
             WHERE id IN (SELECT followee_id FROM follows WHERE follower_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("release followers")?;

        sqlx::query(
            r#"
            UPDATE users SET following = following - 1
             WHERE id IN (SELECT follower_id FROM follows WHERE followee_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("release following")?;

        sqlx::query(
            r#"
            UPDATE posts SET likes = likes - 1
             WHERE user_id <> $1
               AND id IN (SELECT post_id FROM likes WHERE user_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("release likes")?;

        let res = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete user")?;

        tx.commit().await.context("commit tx")?;
        Ok(res.rows_affected() == 1)
    }
}
