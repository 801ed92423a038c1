//! Health check endpoint

/// GET /healthz - unconditional liveness probe
pub async fn healthz() -> &'static str {
    "ok"
}
