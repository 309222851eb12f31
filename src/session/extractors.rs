use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::{cookie, SessionIdentity};
use crate::{error::AppError, state::AppState};

/// Auth gate: resolves the session cookie to a live session, or rejects the
/// request with a redirect to `/login` before the handler runs.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub session_id: String,
    pub identity: SessionIdentity,
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(session_id) = cookie::read_cookie(&parts.headers, &state.config.session.cookie_name)
        else {
            debug!("no session cookie");
            return Err(AppError::Unauthenticated);
        };

        let Some(record) = state.sessions.load(session_id).await? else {
            debug!("unknown session id");
            return Err(AppError::Unauthenticated);
        };

        if record.is_expired(OffsetDateTime::now_utc()) {
            if let Err(e) = state.sessions.destroy(&record.id).await {
                warn!(error = %e, "failed to remove expired session");
            }
            state.tokens.forget(&record.id);
            debug!(user_id = %record.identity.user_id, "session expired");
            return Err(AppError::Unauthenticated);
        }

        Ok(SessionUser {
            session_id: record.id,
            identity: record.identity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRecord;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    fn probe(state: AppState) -> Router {
        Router::new()
            .route("/probe", get(|user: SessionUser| async move { user.identity.username }))
            .with_state(state)
    }

    fn request(cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/probe");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn seeded(state: &AppState, ttl: time::Duration) -> SessionRecord {
        let rec = SessionRecord::new(
            SessionIdentity {
                user_id: Uuid::new_v4(),
                username: "alice".into(),
                email: "a@x.com".into(),
            },
            None,
            ttl,
        );
        state.sessions.save(&rec).await.unwrap();
        rec
    }

    #[tokio::test]
    async fn missing_cookie_redirects_to_login() {
        let res = probe(AppState::fake()).oneshot(request(None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn unknown_session_redirects_to_login() {
        let res = probe(AppState::fake())
            .oneshot(request(Some("sid=does-not-exist")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn live_session_reaches_handler() {
        let state = AppState::fake();
        let rec = seeded(&state, time::Duration::hours(1)).await;

        let res = probe(state)
            .oneshot(request(Some(&format!("sid={}", rec.id))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"alice");
    }

    #[tokio::test]
    async fn expired_session_is_rejected_and_removed() {
        let state = AppState::fake();
        let rec = seeded(&state, time::Duration::seconds(-5)).await;

        let res = probe(state.clone())
            .oneshot(request(Some(&format!("sid={}", rec.id))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert!(state.sessions.load(&rec.id).await.unwrap().is_none());
    }
}
