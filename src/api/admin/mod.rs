//! Admin API endpoints for temporary key management

pub mod keys;

use axum::{
    routing::{get, post},
    Router,
};

use super::state::AppState;

/// Create the admin API router. Every method router falls back to the
/// uniform 404 so unsupported methods never answer 405.
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api-keys",
            post(keys::issue_key).fallback(keys::not_found),
        )
        .route(
            "/api-keys/cleanup",
            post(keys::cleanup).fallback(keys::not_found),
        )
        .route(
            "/api-keys/{key}",
            get(keys::get_key).fallback(keys::not_found),
        )
        .route(
            "/api-keys/{key}/revoke",
            post(keys::revoke_key).fallback(keys::not_found),
        )
        .fallback(keys::not_found)
}
