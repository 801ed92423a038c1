//! Observability infrastructure - metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    create_metrics_router, init_metrics, record_key_issue, record_key_validation,
    set_temporary_keys_active, PrometheusMetrics,
};
