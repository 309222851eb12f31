use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Form pages a client re-renders with a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Login,
    Register,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PageBody {
    pub page: Page,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PageBody {
    pub fn blank(page: Page) -> Self {
        Self {
            page,
            message: None,
        }
    }

    pub fn with_message(page: Page, message: impl Into<String>) -> Self {
        Self {
            page,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 302 to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// 302 to `location`, setting the given `Set-Cookie` value.
pub fn found_with_cookie(location: &str, cookie: String) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location.to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_sets_location() {
        let res = found("/login");
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn page_body_omits_missing_message() {
        let json = serde_json::to_string(&PageBody::blank(Page::Register)).unwrap();
        assert_eq!(json, r#"{"page":"register"}"#);
    }
}
