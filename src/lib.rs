pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod music;
pub mod posts;
pub mod response;
pub mod session;
pub mod social;
pub mod state;
