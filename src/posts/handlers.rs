use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    feed_size, is_valid_track_id, CommentRequest, CreatePostRequest, LikeResponse,
    MAX_CAPTION_LEN, MAX_COMMENT_LEN,
};
use super::repo;
use super::repo_types::{CommentView, LikeOutcome, Post, PostView};
use crate::{
    error::AppError,
    music::MusicError,
    response::MessageBody,
    session::SessionUser,
    state::AppState,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/home/:amount", get(home))
        .route("/post/like/:post_id", post(like_post))
        .route("/post/unlike/:post_id", post(unlike_post))
        .route("/post/delete/:post_id", post(delete_post))
        .route(
            "/post/comments/:post_id",
            get(list_comments).post(add_comment),
        )
}

#[instrument(skip(state, session), fields(user_id = %session.identity.user_id))]
pub async fn home(
    State(state): State<AppState>,
    session: SessionUser,
    Path(amount): Path<i64>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let posts = repo::list_feed(&state.db, session.identity.user_id, feed_size(amount)).await?;
    Ok(Json(posts))
}

/// `POST /profile`; the route lives with the profile view in `social`.
#[instrument(skip(state, session, payload), fields(user_id = %session.identity.user_id))]
pub async fn create_post(
    State(state): State<AppState>,
    session: SessionUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let track_id = payload.track_id.trim();
    if track_id.is_empty() {
        return Err(AppError::BadRequest("A track is required.".into()));
    }
    if !is_valid_track_id(track_id) {
        warn!(%track_id, "malformed track id");
        return Err(AppError::BadRequest("That is not a valid track id.".into()));
    }
    let caption = payload
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if caption.is_some_and(|c| c.chars().count() > MAX_CAPTION_LEN) {
        return Err(AppError::BadRequest(format!(
            "Captions are limited to {MAX_CAPTION_LEN} characters."
        )));
    }

    let token = state.tokens.access_token(&session.session_id).await?;
    let track = match state.music.track(&token, track_id).await {
        Ok(t) => t,
        Err(MusicError::NotFound) => {
            warn!(%track_id, "unknown track");
            return Err(AppError::NotFound("Track not found.".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let post = repo::insert_post(&state.db, session.identity.user_id, &track, caption).await?;
    info!(post_id = %post.id, track_id = %post.track_id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state, session), fields(user_id = %session.identity.user_id))]
pub async fn like_post(
    State(state): State<AppState>,
    session: SessionUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<LikeResponse>, AppError> {
    match repo::like(&state.db, post_id, session.identity.user_id).await? {
        LikeOutcome::Applied(likes) => Ok(Json(LikeResponse {
            post_id,
            likes,
            liked: true,
        })),
        LikeOutcome::Unchanged => Err(AppError::Conflict("You already liked this post.".into())),
        LikeOutcome::PostMissing => Err(AppError::NotFound("Post not found.".into())),
    }
}

#[instrument(skip(state, session), fields(user_id = %session.identity.user_id))]
pub async fn unlike_post(
    State(state): State<AppState>,
    session: SessionUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<LikeResponse>, AppError> {
    match repo::unlike(&state.db, post_id, session.identity.user_id).await? {
        LikeOutcome::Applied(likes) => Ok(Json(LikeResponse {
            post_id,
            likes,
            liked: false,
        })),
        LikeOutcome::Unchanged => Err(AppError::Conflict("You have not liked this post.".into())),
        LikeOutcome::PostMissing => Err(AppError::NotFound("Post not found.".into())),
    }
}

#[instrument(skip(state, session), fields(user_id = %session.identity.user_id))]
pub async fn delete_post(
    State(state): State<AppState>,
    session: SessionUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<MessageBody>, AppError> {
    if !repo::delete_post(&state.db, post_id, session.identity.user_id).await? {
        return Err(AppError::NotFound("Post not found.".into()));
    }
    info!(%post_id, "post deleted");
    Ok(Json(MessageBody::new("Post deleted")))
}

#[instrument(skip(state, session, payload), fields(user_id = %session.identity.user_id))]
pub async fn add_comment(
    State(state): State<AppState>,
    session: SessionUser,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), AppError> {
    let body = payload.body.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty.".into()));
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "Comments are limited to {MAX_COMMENT_LEN} characters."
        )));
    }

    let comment = repo::add_comment(&state.db, post_id, session.identity.user_id, body)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found.".into()))?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(state, _session))]
pub async fn list_comments(
    State(state): State<AppState>,
    _session: SessionUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Vec<CommentView>>, AppError> {
    let comments = repo::list_comments(&state.db, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found.".into()))?;
    Ok(Json(comments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionIdentity, SessionRecord};
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use tower::ServiceExt;

    async fn signed_in(state: &AppState) -> String {
        let rec = SessionRecord::new(
            SessionIdentity {
                user_id: Uuid::new_v4(),
                username: "alice".into(),
                email: "a@x.com".into(),
            },
            None,
            time::Duration::hours(1),
        );
        state.sessions.save(&rec).await.unwrap();
        format!("sid={}", rec.id)
    }

    fn json_post(uri: &str, cookie: &str, body: &'static str) -> Request<Body> {
        Request::post(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn protected_routes_redirect_without_session() {
        let app = post_routes().with_state(AppState::fake());
        for uri in [
            "/home/10",
            "/post/comments/6a2f41a3-c54c-fce8-32d2-0324e1c32e22",
        ] {
            let res = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::FOUND, "{uri}");
            assert_eq!(res.headers()[header::LOCATION], "/login");
        }
    }

    #[tokio::test]
    async fn blank_comment_is_rejected() {
        let state = AppState::fake();
        let cookie = signed_in(&state).await;
        let res = post_routes()
            .with_state(state)
            .oneshot(json_post(
                &format!("/post/comments/{}", Uuid::new_v4()),
                &cookie,
                r#"{"body":"   "}"#,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn posting_needs_a_linked_account() {
        let state = AppState::fake();
        let cookie = signed_in(&state).await;
        let res = crate::app::build_app(state)
            .oneshot(json_post("/profile", &cookie, r#"{"track_id":"abc"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn malformed_track_id_is_rejected_before_any_provider_call() {
        let state = AppState::fake();
        let cookie = signed_in(&state).await;
        let res = crate::app::build_app(state)
            .oneshot(json_post("/profile", &cookie, r#"{"track_id":"../me"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn overlong_caption_is_rejected() {
        let state = AppState::fake();
        let cookie = signed_in(&state).await;
        let caption = "x".repeat(MAX_CAPTION_LEN + 1);
        let body = format!(r#"{{"track_id":"abc","caption":"{caption}"}}"#);
        let res = crate::app::build_app(state)
            .oneshot(
                Request::post("/profile")
                    .header(header::COOKIE, cookie)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
