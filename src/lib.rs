//! pdfgate
//!
//! An HTTP service that renders the first page of an uploaded PDF to JPEG,
//! gated by a two-tier API-key authorization layer:
//! - static client keys loaded from configuration
//! - temporary keys with usage counts, expiry, and revocation, validated
//!   per request through a transactional store

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use api::state::AppState;
use config::{parse_bool_env, parse_key_list, StorageBackend};
use domain::api_key::KeyRepository;
use infrastructure::api_key::{InMemoryKeyRepository, KeyService, PostgresKeyRepository};
use infrastructure::render::{ConvertService, PopplerOpener, DEFAULT_JPEG_QUALITY};

/// Create the application state with all services initialized.
///
/// Key material and the store location come straight from the
/// environment; key sets are fail-closed.
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let static_keys = parse_key_list(&std::env::var("API_KEYS").unwrap_or_default());
    if static_keys.is_empty() {
        anyhow::bail!("missing API_KEYS environment variable");
    }

    let master_keys = parse_key_list(&std::env::var("MASTER_API_KEYS").unwrap_or_default());
    if master_keys.is_empty() {
        anyhow::bail!("missing MASTER_API_KEYS environment variable");
    }

    let key_service = if parse_bool_env("ENABLE_TEMPORARY_KEYS", true) {
        Some(Arc::new(KeyService::new(
            create_key_repository(config).await?,
        )))
    } else {
        info!("temporary key verification disabled");
        None
    };

    let converter = ConvertService::new(Arc::new(PopplerOpener::new()), DEFAULT_JPEG_QUALITY);

    Ok(AppState::new(
        static_keys,
        master_keys,
        key_service,
        converter,
    ))
}

async fn create_key_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn KeyRepository>> {
    match config.storage.backend() {
        StorageBackend::Postgres => {
            let url = std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable is required")?;

            info!("Connecting to PostgreSQL...");
            let pool = sqlx::PgPool::connect(&url)
                .await
                .context("failed to connect to PostgreSQL")?;
            info!("PostgreSQL connection established");

            let repo = PostgresKeyRepository::new(pool, config.storage.table.clone())?;
            repo.ensure_schema()
                .await
                .context("failed to create key table")?;
            Ok(Arc::new(repo))
        }
        StorageBackend::Memory => {
            warn!(
                "Using in-memory key storage. Temporary keys will not survive a restart; \
                 set APP__STORAGE__BACKEND=postgres for production."
            );
            Ok(Arc::new(InMemoryKeyRepository::new()))
        }
    }
}
