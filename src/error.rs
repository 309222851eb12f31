use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::{
    auth::sync::SyncError,
    music::{MusicError, TokenError},
    response::{found, MessageBody, Page, PageBody},
};

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
const MUSIC_UNAVAILABLE: &str = "The music service is unavailable right now. Please try again.";

/// Request-level failure, mapped onto a status code and a body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Form input rejected; the client re-renders `page` with `message`.
    #[error("{message}")]
    Form {
        page: Page,
        status: StatusCode,
        message: String,
    },

    /// No usable session; redirect to the login page.
    #[error("not authenticated")]
    Unauthenticated,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Music(#[from] MusicError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn form(page: Page, status: StatusCode, message: impl Into<String>) -> Self {
        Self::Form {
            page,
            status,
            message: message.into(),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::SessionGone => AppError::Unauthenticated,
            TokenError::NotLinked => {
                AppError::Conflict("Link your music account before doing that.".into())
            }
            TokenError::Refresh(e) => AppError::Music(e),
            TokenError::Store(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message =
            |status: StatusCode, msg: String| (status, Json(MessageBody::new(msg))).into_response();

        match self {
            AppError::Form {
                page,
                status,
                message,
            } => (status, Json(PageBody::with_message(page, message))).into_response(),
            AppError::Unauthenticated => found("/login"),
            AppError::BadRequest(m) => message(StatusCode::BAD_REQUEST, m),
            AppError::Forbidden(m) => message(StatusCode::FORBIDDEN, m),
            AppError::NotFound(m) => message(StatusCode::NOT_FOUND, m),
            AppError::Conflict(m) => message(StatusCode::CONFLICT, m),
            AppError::Music(e) => {
                error!(error = %e, "music api call failed");
                message(StatusCode::BAD_GATEWAY, MUSIC_UNAVAILABLE.into())
            }
            AppError::Sync(e) => {
                error!(error = %e, step = ?e.step, "profile sync failed");
                message(StatusCode::BAD_GATEWAY, e.step.user_message().into())
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                message(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn unauthenticated_redirects_to_login() {
        let res = AppError::Unauthenticated.into_response();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn form_error_keeps_its_status() {
        let res = AppError::form(Page::Login, StatusCode::UNAUTHORIZED, "nope").into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn token_errors_map_to_request_errors() {
        assert!(matches!(
            AppError::from(TokenError::SessionGone),
            AppError::Unauthenticated
        ));
        assert!(matches!(
            AppError::from(TokenError::NotLinked),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(TokenError::Refresh(MusicError::NotFound)),
            AppError::Music(_)
        ));
    }

    #[test]
    fn internal_error_hides_the_cause() {
        let res = AppError::Internal(anyhow::anyhow!("db exploded")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
