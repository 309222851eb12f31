use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Applied,
    /// Already following (follow) or not following (unfollow).
    Unchanged,
    UserMissing,
}

async fn user_exists(db: impl sqlx::PgExecutor<'_>, id: Uuid) -> anyhow::Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)"#)
        .bind(id)
        .fetch_one(db)
        .await
        .context("check user")?;
    Ok(exists)
}

/// Insert the follow edge if absent and move both counters in the same transaction.
pub async fn follow(db: &PgPool, follower: Uuid, followee: Uuid) -> anyhow::Result<FollowOutcome> {
    let mut tx = db.begin().await.context("begin tx")?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO follows (follower_id, followee_id)
        SELECT $1, $2 WHERE EXISTS (SELECT 1 FROM users WHERE id = $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(follower)
    .bind(followee)
    .execute(&mut *tx)
    .await
    .context("insert follow")?
    .rows_affected();

    let outcome = if inserted == 1 {
        adjust_counters(&mut tx, follower, followee, 1).await?;
        FollowOutcome::Applied
    } else if user_exists(&mut *tx, followee).await? {
        FollowOutcome::Unchanged
    } else {
        FollowOutcome::UserMissing
    };

    tx.commit().await.context("commit tx")?;
    Ok(outcome)
}

/// Remove the follow edge if present and move both counters in the same transaction.
pub async fn unfollow(
    db: &PgPool,
    follower: Uuid,
    followee: Uuid,
) -> anyhow::Result<FollowOutcome> {
    let mut tx = db.begin().await.context("begin tx")?;

    let deleted = sqlx::query(r#"DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2"#)
        .bind(follower)
        .bind(followee)
        .execute(&mut *tx)
        .await
        .context("delete follow")?
        .rows_affected();

    let outcome = if deleted == 1 {
        adjust_counters(&mut tx, follower, followee, -1).await?;
        FollowOutcome::Applied
    } else if user_exists(&mut *tx, followee).await? {
        FollowOutcome::Unchanged
    } else {
        FollowOutcome::UserMissing
    };

    tx.commit().await.context("commit tx")?;
    Ok(outcome)
}

async fn adjust_counters(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    follower: Uuid,
    followee: Uuid,
    delta: i32,
) -> anyhow::Result<()> {
    sqlx::query(r#"UPDATE users SET following = following + $2 WHERE id = $1"#)
        .bind(follower)
        .bind(delta)
        .execute(&mut **tx)
        .await
        .context("update following")?;
    sqlx::query(r#"UPDATE users SET followers = followers + $2 WHERE id = $1"#)
        .bind(followee)
        .bind(delta)
        .execute(&mut **tx)
        .await
        .context("update followers")?;
    Ok(())
}

pub async fn is_following(db: &PgPool, follower: Uuid, followee: Uuid) -> anyhow::Result<bool> {
    let following = sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)"#,
    )
    .bind(follower)
    .bind(followee)
    .fetch_one(db)
    .await
    .context("check follow")?;
    Ok(following)
}
