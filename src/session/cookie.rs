use axum::http::{header, HeaderMap};

use crate::config::SessionConfig;

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

pub fn session_cookie(cfg: &SessionConfig, session_id: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        cfg.cookie_name,
        session_id,
        cfg.ttl_minutes * 60
    );
    if cfg.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(cfg: &SessionConfig) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        cfg.cookie_name
    )
}
