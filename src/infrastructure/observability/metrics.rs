//! Prometheus metrics infrastructure
//!
//! The authorization core exposes three series: the issue counter
//! (`api_key_issue_total`), the validation counter
//! (`api_key_validation_total`), and the active-keys gauge
//! (`temporary_keys_active`). Counter labels carry hashed operator
//! identifiers only.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;
use crate::domain::api_key::ValidationOutcome;

/// Prometheus metrics handle for serving the metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
    path: String,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// The route the exposition endpoint is served on
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    let builder = PrometheusBuilder::new();

    match builder.install_recorder() {
        Ok(handle) => {
            register_default_metrics();

            let path = normalize_path(&config.path);
            tracing::info!("Prometheus metrics initialized at {}", path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
                path,
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("pdfgate_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    gauge!("temporary_keys_active").set(0.0);
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "/metrics".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Create the metrics router, serving on the configured path
pub fn create_metrics_router(metrics: PrometheusMetrics) -> Router {
    let path = metrics.path.clone();
    Router::new()
        .route(&path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Count a key issuance attempt. `operator_hash` is the hashed admin
/// identity, never the raw key.
pub fn record_key_issue(result: &'static str, operator_hash: &str) {
    counter!(
        "api_key_issue_total",
        "result" => result,
        "operator" => operator_hash.to_string()
    )
    .increment(1);
}

/// Count a validation decision by outcome.
pub fn record_key_validation(outcome: ValidationOutcome) {
    counter!("api_key_validation_total", "outcome" => outcome.as_str()).increment(1);
}

/// Set the gauge of temporary keys that are simultaneously non-revoked,
/// non-expired, and have remaining usage.
pub fn set_temporary_keys_active(count: u64) {
    gauge!("temporary_keys_active").set(count as f64);
}
