//! API key service
//!
//! Coordinates issuance, validation, and lifecycle operations for temporary
//! API keys. Owns the decision cache and the clock; every authorized
//! validation pays a store round-trip so consumption stays at-most-once.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::api_key::{KeyRecord, KeyRepository, KeyType, ValidationOutcome};
use crate::domain::DomainError;
use crate::infrastructure::observability::{
    record_key_issue, record_key_validation, set_temporary_keys_active,
};

use super::cache::DecisionCache;
use super::generator::{generate_key, hash_identifier};

pub const DEFAULT_KEY_LENGTH: usize = 32;
pub const DEFAULT_CLEANUP_LIMIT: u32 = 200;
pub const KEY_HASH_PREFIX_LEN: usize = 16;
pub const OPERATOR_HASH_PREFIX_LEN: usize = 16;

const NEGATIVE_CACHE_TTL: Duration = Duration::from_secs(30);
/// Short TTL so a recovered store is retried quickly.
const ERROR_CACHE_TTL: Duration = Duration::from_secs(5);

/// Time source, injectable for deterministic expiry tests.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parameters for issuing a temporary key.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub label: String,
    pub usage_limit: u32,
    pub ttl: Duration,
    pub operator: String,
}

/// The raw key is returned exactly once, at issuance.
#[derive(Debug, Clone)]
pub struct IssueResponse {
    pub key: String,
    pub record: KeyRecord,
}

/// Service for temporary key management and request validation.
#[derive(Debug)]
pub struct KeyService {
    repo: Arc<dyn KeyRepository>,
    clock: Arc<dyn Clock>,
    cache: DecisionCache,
}

impl KeyService {
    pub fn new(repo: Arc<dyn KeyRepository>) -> Self {
        Self::with_clock(repo, Arc::new(SystemClock))
    }

    pub fn with_clock(repo: Arc<dyn KeyRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            cache: DecisionCache::new(),
        }
    }

    /// Issue a fresh temporary key and persist its record.
    pub async fn issue_temporary_key(
        &self,
        req: IssueRequest,
    ) -> Result<IssueResponse, DomainError> {
        let operator_hash = hash_identifier(&req.operator, OPERATOR_HASH_PREFIX_LEN);
        let raw_key = generate_key(DEFAULT_KEY_LENGTH);

        let now = self.clock.now();
        let record = KeyRecord {
            key: raw_key.clone(),
            kind: KeyType::Temporary,
            label: req.label.clone(),
            created_at: now,
            expires_at: now + chrono::Duration::from_std(req.ttl).unwrap_or_else(|_| chrono::Duration::zero()),
            max_usage: req.usage_limit,
            remaining_usage: req.usage_limit,
            revoked_at: None,
        };

        if let Err(err) = self.repo.create(record.clone()).await {
            record_key_issue("error", &operator_hash);
            return Err(err);
        }

        // A stale negative decision for a recycled key value must not
        // outlive issuance.
        self.cache.delete(&raw_key).await;
        record_key_issue("success", &operator_hash);
        self.refresh_active_gauge().await;

        let key_hash = hash_identifier(&raw_key, KEY_HASH_PREFIX_LEN);
        info!(
            event = "api_key_issue",
            api_key_hash = %key_hash,
            operator = %operator_hash,
            label = %req.label,
            usage_limit = req.usage_limit,
            ttl_secs = req.ttl.as_secs(),
        );

        Ok(IssueResponse {
            key: raw_key,
            record,
        })
    }

    pub async fn get(&self, key: &str) -> Result<KeyRecord, DomainError> {
        self.repo.get(key).await
    }

    pub async fn revoke(&self, key: &str, operator: &str) -> Result<KeyRecord, DomainError> {
        let record = self.repo.revoke(key, self.clock.now()).await?;

        self.cache
            .set(
                key,
                ValidationOutcome::Revoked,
                NEGATIVE_CACHE_TTL,
                self.clock.now(),
            )
            .await;
        self.refresh_active_gauge().await;

        info!(
            event = "api_key_revoke",
            api_key_hash = %hash_identifier(key, KEY_HASH_PREFIX_LEN),
            operator = %hash_identifier(operator, OPERATOR_HASH_PREFIX_LEN),
        );

        Ok(record)
    }

    /// Delete up to `limit` expired records; `limit == 0` means the
    /// default, and values above the default are clamped to it.
    pub async fn cleanup_expired(&self, limit: u32) -> Result<u64, DomainError> {
        let effective = if limit == 0 {
            DEFAULT_CLEANUP_LIMIT
        } else {
            limit.min(DEFAULT_CLEANUP_LIMIT)
        };

        let count = self.repo.delete_expired(self.clock.now(), effective).await?;
        if count > 0 {
            self.refresh_active_gauge().await;
        }
        Ok(count)
    }

    /// Validate a key and consume one use. Negative decisions are served
    /// from the cache; authorized decisions always go through the store
    /// transaction and are never cached.
    pub async fn validate_and_consume(&self, key: &str) -> Result<KeyRecord, ValidationOutcome> {
        if let Some(outcome) = self.cache.get(key, self.clock.now()).await {
            record_key_validation(outcome);
            return Err(outcome);
        }

        match self.repo.consume(key, self.clock.now()).await {
            Ok(record) => {
                self.cache.delete(key).await;
                record_key_validation(ValidationOutcome::Authorized);
                Ok(record)
            }
            Err(err) => {
                let outcome = ValidationOutcome::from_error(&err);
                let ttl = if outcome == ValidationOutcome::Error {
                    ERROR_CACHE_TTL
                } else {
                    NEGATIVE_CACHE_TTL
                };
                self.cache.set(key, outcome, ttl, self.clock.now()).await;

                if matches!(err, DomainError::KeyExpired) {
                    match self.repo.delete(key).await {
                        Ok(()) => self.refresh_active_gauge().await,
                        Err(del_err) => warn!(
                            api_key_hash = %hash_identifier(key, KEY_HASH_PREFIX_LEN),
                            error = %del_err,
                            "failed to delete expired key",
                        ),
                    }
                }

                record_key_validation(outcome);
                Err(outcome)
            }
        }
    }

    async fn refresh_active_gauge(&self) {
        match self.repo.count_active(self.clock.now()).await {
            Ok(count) => set_temporary_keys_active(count),
            Err(err) => warn!(error = %err, "failed to refresh active keys gauge"),
        }
    }
}
