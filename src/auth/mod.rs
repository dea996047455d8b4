use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod jwt;
pub mod one_time_token;
pub mod password;
pub mod service;
pub mod verification;
pub(crate) mod extractors;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
