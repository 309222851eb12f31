use axum::http::StatusCode;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{auth::dto::RegisterRequest, error::AppError, response::Page};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

/// Registration input after validation and normalization.
#[derive(Debug, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    /// Lowercased.
    pub email: String,
    pub password: String,
}

fn rejected(message: &str) -> AppError {
    AppError::form(Page::Register, StatusCode::BAD_REQUEST, message)
}

pub fn validate_registration(req: RegisterRequest) -> Result<NewUser, AppError> {
    let username = req.username.trim();
    let email = req.email.trim().to_lowercase();

    if username.is_empty() || email.is_empty() || req.password1.is_empty() {
        return Err(rejected("Username, email and password are required."));
    }
    if req.password1 != req.password2 {
        return Err(rejected("Passwords do not match."));
    }
    if !is_valid_username(username) {
        return Err(rejected(
            "Username must be 3-32 characters: letters, digits, '.', '_' or '-'.",
        ));
    }
    if !is_valid_email(&email) {
        return Err(rejected("Please enter a valid email address."));
    }

    Ok(NewUser {
        username: username.to_string(),
        email,
        password: req.password1,
    })
}
