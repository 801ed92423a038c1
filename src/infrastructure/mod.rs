//! Infrastructure layer - store, cache, rendering, and observability

pub mod api_key;
pub mod logging;
pub mod observability;
pub mod render;
