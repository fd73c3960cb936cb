use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod provider;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod social;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
