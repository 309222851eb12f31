use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{CallbackQuery, LoginRequest, RegisterRequest},
        password::{hash_password, verify_password},
        repo_types::{TakenField, User},
        services::validate_registration,
        sync::sync_profile,
    },
    error::AppError,
    response::{found, found_with_cookie, MessageBody, Page, PageBody},
    session::{cookie, random_token, SessionIdentity, SessionRecord, SessionUser},
    state::AppState,
};

pub const HOME: &str = "/home/20";
pub const USER_NOT_FOUND: &str = "User not found. Please check your username.";
pub const BAD_CREDENTIALS: &str = "Incorrect username or password.";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
        .route("/callback", get(callback))
        .route("/delete/:username", delete(delete_account))
}

pub async fn register_page() -> Json<PageBody> {
    Json(PageBody::blank(Page::Register))
}

pub async fn login_page() -> Json<PageBody> {
    Json(PageBody::blank(Page::Login))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let new_user = validate_registration(payload).map_err(|e| {
        warn!(reason = %e, "registration rejected");
        e
    })?;

    let hash = hash_password(&new_user.password)?;

    let Some(user) =
        User::create_if_absent(&state.db, &new_user.username, &new_user.email, &hash).await?
    else {
        let message = match User::taken_field(&state.db, &new_user.username).await? {
            TakenField::Username => "Username already exists. Please choose a different one.",
            TakenField::Email => "Email is already registered.",
        };
        warn!(username = %new_user.username, message, "registration conflict");
        return Err(AppError::form(Page::Register, StatusCode::CONFLICT, message));
    };

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(found("/login"))
}

#[instrument(skip(state, headers, payload))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(AppError::form(
            Page::Login,
            StatusCode::BAD_REQUEST,
            "Username and password are required.",
        ));
    }

    let Some(user) = User::find_by_username(&state.db, username).await? else {
        warn!(%username, "login unknown username");
        return Err(AppError::form(Page::Login, StatusCode::UNAUTHORIZED, USER_NOT_FOUND));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::form(Page::Login, StatusCode::UNAUTHORIZED, BAD_CREDENTIALS));
    }

    // A new login never reuses the caller's previous session id.
    let session_cfg = &state.config.session;
    if let Some(old) = cookie::read_cookie(&headers, &session_cfg.cookie_name) {
        state.sessions.destroy(old).await?;
        state.tokens.forget(old);
    }

    let mut record = SessionRecord::new(
        SessionIdentity::from(&user),
        user.music_refresh_token.clone(),
        time::Duration::minutes(session_cfg.ttl_minutes),
    );
    let set_cookie = cookie::session_cookie(session_cfg, &record.id);

    if record.refresh_token.is_none() {
        let nonce = random_token(32);
        let authorize_url = state.music.authorize_url(&nonce)?;
        record.oauth_state = Some(nonce);
        state.sessions.save(&record).await?;
        info!(user_id = %user.id, "user logged in, linking music account");
        return Ok(found_with_cookie(&authorize_url, set_cookie));
    }

    state.sessions.save(&record).await?;
    info!(user_id = %user.id, "user logged in");

    // The session exists from here on, so the cookie goes out even if sync fails.
    match sync_profile(&state, &record.id, user.id).await {
        Ok(_) => Ok(found_with_cookie(HOME, set_cookie)),
        Err(e) => Ok((
            [(header::SET_COOKIE, set_cookie)],
            AppError::Sync(e),
        )
            .into_response()),
    }
}

#[instrument(skip(state, session, query), fields(user_id = %session.identity.user_id))]
pub async fn callback(
    State(state): State<AppState>,
    session: SessionUser,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    if let Some(reason) = query.error {
        warn!(%reason, "music account linking declined");
        return Err(AppError::BadRequest(format!(
            "Music account linking was cancelled ({reason})."
        )));
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code.".into()))?;

    let record = state
        .sessions
        .load(&session.session_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    if record.oauth_state.is_none() || record.oauth_state != query.state {
        warn!("oauth state mismatch");
        return Err(AppError::BadRequest(
            "Authorization state mismatch. Please log in again.".into(),
        ));
    }

    let grant = state.music.exchange_code(&code).await?;
    let record = state.tokens.install(&session.session_id, &grant).await?;
    if let Some(refresh) = &record.refresh_token {
        User::set_refresh_token(&state.db, session.identity.user_id, refresh).await?;
    }
    info!("music account linked");

    sync_profile(&state, &session.session_id, session.identity.user_id).await?;
    Ok(found(HOME))
}

#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session_cfg = &state.config.session;
    if let Some(id) = cookie::read_cookie(&headers, &session_cfg.cookie_name) {
        state.sessions.destroy(id).await?;
        state.tokens.forget(id);
        info!("session destroyed");
    }
    Ok((
        [(header::SET_COOKIE, cookie::clear_cookie(session_cfg))],
        Json(PageBody::with_message(Page::Login, "Logged out Successfully")),
    )
        .into_response())
}

#[instrument(skip(state, session), fields(user_id = %session.identity.user_id))]
pub async fn delete_account(
    State(state): State<AppState>,
    session: SessionUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    if !session.identity.username.eq_ignore_ascii_case(&username) {
        warn!(%username, "attempt to delete another account");
        return Err(AppError::Forbidden(
            "You can only delete your own account.".into(),
        ));
    }

    let user_id = session.identity.user_id;
    let removed = User::delete_account(&state.db, user_id).await?;
    let sessions = state.sessions.destroy_for_user(user_id).await?;
    state.tokens.forget(&session.session_id);
    info!(removed, sessions, "account deleted");

    Ok((
        [(header::SET_COOKIE, cookie::clear_cookie(&state.config.session))],
        Json(MessageBody::new("User deleted successfully")),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn seeded_session(state: &AppState, username: &str) -> SessionRecord {
        let rec = SessionRecord::new(
            SessionIdentity {
                user_id: Uuid::new_v4(),
                username: username.into(),
                email: format!("{username}@x.com"),
            },
            None,
            time::Duration::hours(1),
        );
        state.sessions.save(&rec).await.unwrap();
        rec
    }

    #[tokio::test]
    async fn logout_without_session_is_fine() {
        let app = auth_routes().with_state(AppState::fake());
        let res = app
            .oneshot(Request::get("/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));
        assert_eq!(body_json(res).await["message"], "Logged out Successfully");
    }

    #[tokio::test]
    async fn logout_destroys_session_and_is_repeatable() {
        let state = AppState::fake();
        let rec = seeded_session(&state, "alice").await;
        let app = auth_routes().with_state(state.clone());

        for _ in 0..2 {
            let res = app
                .clone()
                .oneshot(
                    Request::get("/logout")
                        .header(header::COOKIE, format!("sid={}", rec.id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        assert!(state.sessions.load(&rec.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn register_rejects_invalid_input_before_touching_db() {
        let app = auth_routes().with_state(AppState::fake());
        let res = app
            .oneshot(
                Request::post("/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"username":"alice","email":"a@x.com","password1":"pw1234","password2":"nope"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = body_json(res).await;
        assert_eq!(body["page"], "register");
        assert_eq!(body["message"], "Passwords do not match.");
    }

    #[tokio::test]
    async fn delete_requires_a_session() {
        let app = auth_routes().with_state(AppState::fake());
        let res = app
            .oneshot(Request::delete("/delete/alice").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn delete_refuses_other_accounts() {
        let state = AppState::fake();
        let rec = seeded_session(&state, "alice").await;
        let app = auth_routes().with_state(state);
        let res = app
            .oneshot(
                Request::delete("/delete/bob")
                    .header(header::COOKIE, format!("sid={}", rec.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn callback_rejects_state_mismatch() {
        let state = AppState::fake();
        let mut rec = seeded_session(&state, "alice").await;
        rec.oauth_state = Some("expected".into());
        state.sessions.save(&rec).await.unwrap();

        let app = auth_routes().with_state(state.clone());
        let res = app
            .oneshot(
                Request::get("/callback?code=abc&state=forged")
                    .header(header::COOKIE, format!("sid={}", rec.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let after = state.sessions.load(&rec.id).await.unwrap().unwrap();
        assert!(after.access_token.is_none());
    }

    #[tokio::test]
    async fn callback_reports_declined_consent() {
        let state = AppState::fake();
        let rec = seeded_session(&state, "alice").await;
        let app = auth_routes().with_state(state);
        let res = app
            .oneshot(
                Request::get("/callback?error=access_denied")
                    .header(header::COOKIE, format!("sid={}", rec.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn form_pages_render() {
        let app = auth_routes().with_state(AppState::fake());
        let res = app
            .oneshot(Request::get("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["page"], "login");
    }
}
