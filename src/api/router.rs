use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::admin;
use super::convert;
use super::health;
use super::state::AppState;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Create the full application router.
pub fn create_router(state: AppState, metrics: Option<PrometheusMetrics>) -> Router {
    let mut router = Router::new()
        .route(
            "/convert",
            post(convert::convert).layer(DefaultBodyLimit::max(convert::MAX_UPLOAD_BYTES)),
        )
        .nest("/admin", admin::create_admin_router())
        .route("/healthz", get(health::healthz))
        .with_state(state);

    if let Some(metrics) = metrics {
        router = router.merge(create_metrics_router(metrics));
    }

    router.layer(TraceLayer::new_for_http())
}
