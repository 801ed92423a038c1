//! API middleware components

pub mod admin_auth;
pub mod auth;

pub use admin_auth::{RequireAdmin, ADMIN_KEY_HEADER};
pub use auth::{AuthenticatedKey, RequireApiKey, API_KEY_HEADER};
