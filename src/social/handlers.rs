use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self, FollowOutcome};
use crate::{
    auth::{dto::PublicProfile, repo_types::User},
    error::AppError,
    posts::{self, repo_types::PostView},
    response::MessageBody,
    session::SessionUser,
    state::AppState,
};

const PROFILE_POSTS: i64 = 50;

#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub user: PublicProfile,
    pub posts: Vec<PostView>,
    /// `None` on the caller's own profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<bool>,
}

pub fn social_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(own_profile).post(posts::handlers::create_post),
        )
        .route("/profile/:user_id", get(user_profile))
        .route("/user/follow/:user_id", post(follow_user))
        .route("/user/unfollow/:user_id", post(unfollow_user))
}

async fn load_profile(state: &AppState, viewer: Uuid, user_id: Uuid) -> Result<ProfilePage, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;
    let posts = posts::repo::list_by_author(&state.db, viewer, user_id, PROFILE_POSTS).await?;
    let following = if viewer == user_id {
        None
    } else {
        Some(repo::is_following(&state.db, viewer, user_id).await?)
    };
    Ok(ProfilePage {
        user: user.into(),
        posts,
        following,
    })
}

#[instrument(skip(state, session), fields(user_id = %session.identity.user_id))]
pub async fn own_profile(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<ProfilePage>, AppError> {
    let me = session.identity.user_id;
    match load_profile(&state, me, me).await {
        // The session outlived its user row.
        Err(AppError::NotFound(_)) => Err(AppError::Unauthenticated),
        other => other.map(Json),
    }
}

#[instrument(skip(state, session), fields(viewer = %session.identity.user_id))]
pub async fn user_profile(
    State(state): State<AppState>,
    session: SessionUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ProfilePage>, AppError> {
    load_profile(&state, session.identity.user_id, user_id)
        .await
        .map(Json)
}

#[instrument(skip(state, session), fields(follower = %session.identity.user_id))]
pub async fn follow_user(
    State(state): State<AppState>,
    session: SessionUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageBody>, AppError> {
    let me = session.identity.user_id;
    if me == user_id {
        return Err(AppError::BadRequest("You cannot follow yourself.".into()));
    }
    match repo::follow(&state.db, me, user_id).await? {
        FollowOutcome::Applied => {
            info!(followee = %user_id, "followed");
            Ok(Json(MessageBody::new("Followed")))
        }
        FollowOutcome::Unchanged => Err(AppError::Conflict(
            "You already follow this user.".into(),
        )),
        FollowOutcome::UserMissing => Err(AppError::NotFound("User not found.".into())),
    }
}

#[instrument(skip(state, session), fields(follower = %session.identity.user_id))]
pub async fn unfollow_user(
    State(state): State<AppState>,
    session: SessionUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageBody>, AppError> {
    let me = session.identity.user_id;
    match repo::unfollow(&state.db, me, user_id).await? {
        FollowOutcome::Applied => {
            info!(followee = %user_id, "unfollowed");
            Ok(Json(MessageBody::new("Unfollowed")))
        }
        FollowOutcome::Unchanged => Err(AppError::Conflict(
            "You do not follow this user.".into(),
        )),
        FollowOutcome::UserMissing => Err(AppError::NotFound("User not found.".into())),
    }
}
