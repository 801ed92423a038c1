//! Admin authentication middleware
//!
//! Protects administrator endpoints: per-client-IP rate limiting first,
//! then the master-key check. The raw admin key becomes the operator
//! identity for auditing; only its hash ever reaches logs.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::api::state::AppState;
use crate::api::types::ApiError;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Extractor that requires a valid administrator key. The payload is the
/// operator identity (the raw admin key value).
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub String);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ip = client_ip(parts);
        if !state.admin_limiter.allow(&ip) {
            warn!(ip = %ip, path = %parts.uri.path(), "admin rate limit exceeded");
            return Err(ApiError::rate_limited("rate limit exceeded"));
        }

        let admin_key = match parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => return Err(ApiError::unauthorized("unauthorized")),
        };

        if !state.master_keys.contains(&admin_key) {
            warn!(ip = %ip, path = %parts.uri.path(), "invalid admin key");
            return Err(ApiError::unauthorized("unauthorized"));
        }

        Ok(Self(admin_key))
    }
}

/// First entry of X-Forwarded-For when present, else the connection peer,
/// else the literal "unknown".
fn client_ip(parts: &Parts) -> String {
    if let Some(forwarded) = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
