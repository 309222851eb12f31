use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod sync;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
