use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{CommentView, LikeOutcome, Post, PostView};
use crate::music::Track;

const POST_COLUMNS: &str = "id, user_id, track_id, track_name, artist_names, album_art, \
     preview_url, caption, likes, created_at";

// $1 is always the viewer.
const POST_VIEW_SELECT: &str = r#"
    SELECT p.id, p.user_id, u.username, p.track_id, p.track_name, p.artist_names,
           p.album_art, p.preview_url, p.caption, p.likes, p.created_at,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
           EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1)
               AS liked_by_me
      FROM posts p
      JOIN users u ON u.id = p.user_id
"#;

pub async fn insert_post(
    db: &PgPool,
    user_id: Uuid,
    track: &Track,
    caption: Option<&str>,
) -> anyhow::Result<Post> {
    let post = sqlx::query_as::<_, Post>(&format!(
        r#"
        INSERT INTO posts (user_id, track_id, track_name, artist_names, album_art, preview_url, caption)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&track.id)
    .bind(&track.name)
    .bind(track.artist_line())
    .bind(&track.album_art)
    .bind(&track.preview_url)
    .bind(caption)
    .fetch_one(db)
    .await
    .context("insert post")?;
    Ok(post)
}

/// Delete a post owned by `user_id`. Returns whether it existed.
pub async fn delete_post(db: &PgPool, post_id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query(r#"DELETE FROM posts WHERE id = $1 AND user_id = $2"#)
        .bind(post_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete post")?;
    Ok(res.rows_affected() == 1)
}

/// Newest posts by the viewer and everyone they follow.
pub async fn list_feed(db: &PgPool, viewer: Uuid, limit: i64) -> anyhow::Result<Vec<PostView>> {
    let rows = sqlx::query_as::<_, PostView>(&format!(
        r#"{POST_VIEW_SELECT}
         WHERE p.user_id = $1
            OR p.user_id IN (SELECT followee_id FROM follows WHERE follower_id = $1)
         ORDER BY p.created_at DESC
         LIMIT $2"#
    ))
    .bind(viewer)
    .bind(limit)
    .fetch_all(db)
    .await
    .context("list feed")?;
    Ok(rows)
}

pub async fn list_by_author(
    db: &PgPool,
    viewer: Uuid,
    author: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<PostView>> {
    let rows = sqlx::query_as::<_, PostView>(&format!(
        r#"{POST_VIEW_SELECT}
         WHERE p.user_id = $2
         ORDER BY p.created_at DESC
         LIMIT $3"#
    ))
    .bind(viewer)
    .bind(author)
    .bind(limit)
    .fetch_all(db)
    .await
    .context("list posts by author")?;
    Ok(rows)
}

async fn post_exists(tx: &mut Transaction<'_, Postgres>, post_id: Uuid) -> anyhow::Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)"#)
        .bind(post_id)
        .fetch_one(&mut **tx)
        .await
        .context("check post")?;
    Ok(exists)
}

/// Insert the like edge if absent and bump the counter in the same transaction.
pub async fn like(db: &PgPool, post_id: Uuid, user_id: Uuid) -> anyhow::Result<LikeOutcome> {
    let mut tx = db.begin().await.context("begin tx")?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO likes (post_id, user_id)
        SELECT $1, $2 WHERE EXISTS (SELECT 1 FROM posts WHERE id = $1)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .context("insert like")?
    .rows_affected();

    let outcome = if inserted == 1 {
        let likes = sqlx::query_scalar::<_, i32>(
            r#"UPDATE posts SET likes = likes + 1 WHERE id = $1 RETURNING likes"#,
        )
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await
        .context("increment likes")?;
        LikeOutcome::Applied(likes)
    } else if post_exists(&mut tx, post_id).await? {
        LikeOutcome::Unchanged
    } else {
        LikeOutcome::PostMissing
    };

    tx.commit().await.context("commit tx")?;
    Ok(outcome)
}

/// Remove the like edge if present and drop the counter in the same transaction.
pub async fn unlike(db: &PgPool, post_id: Uuid, user_id: Uuid) -> anyhow::Result<LikeOutcome> {
    let mut tx = db.begin().await.context("begin tx")?;

    let deleted = sqlx::query(r#"DELETE FROM likes WHERE post_id = $1 AND user_id = $2"#)
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("delete like")?
        .rows_affected();

    let outcome = if deleted == 1 {
        let likes = sqlx::query_scalar::<_, i32>(
            r#"UPDATE posts SET likes = likes - 1 WHERE id = $1 RETURNING likes"#,
        )
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await
        .context("decrement likes")?;
        LikeOutcome::Applied(likes)
    } else if post_exists(&mut tx, post_id).await? {
        LikeOutcome::Unchanged
    } else {
        LikeOutcome::PostMissing
    };

    tx.commit().await.context("commit tx")?;
    Ok(outcome)
}

/// Add a comment; `None` when the post does not exist.
pub async fn add_comment(
    db: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
    body: &str,
) -> anyhow::Result<Option<CommentView>> {
    let row = sqlx::query_as::<_, CommentView>(
        r#"
        WITH inserted AS (
            INSERT INTO comments (post_id, user_id, body)
            SELECT $1, $2, $3 WHERE EXISTS (SELECT 1 FROM posts WHERE id = $1)
            RETURNING id, post_id, user_id, body, created_at
        )
        SELECT i.id, i.post_id, i.user_id, u.username, i.body, i.created_at
          FROM inserted i
          JOIN users u ON u.id = i.user_id
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(body)
    .fetch_optional(db)
    .await
    .context("insert comment")?;
    Ok(row)
}

/// Comments of a post, oldest first; `None` when the post does not exist.
pub async fn list_comments(
    db: &PgPool,
    post_id: Uuid,
) -> anyhow::Result<Option<Vec<CommentView>>> {
    let exists = sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)"#)
        .bind(post_id)
        .fetch_one(db)
        .await
        .context("check post")?;
    if !exists {
        return Ok(None);
    }

    let rows = sqlx::query_as::<_, CommentView>(
        r#"
        SELECT c.id, c.post_id, c.user_id, u.username, c.body, c.created_at
          FROM comments c
          JOIN users u ON u.id = c.user_id
         WHERE c.post_id = $1
         ORDER BY c.created_at ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(db)
    .await
    .context("list comments")?;
    Ok(Some(rows))
}
