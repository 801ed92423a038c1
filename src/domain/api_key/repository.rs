//! Temporary key repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::entity::KeyRecord;
use crate::domain::DomainError;

/// Persistence contract for temporary keys. All operations are safe under
/// concurrent callers; `consume` and `revoke` must be atomic
/// read-check-write transitions.
#[async_trait]
pub trait KeyRepository: Send + Sync + Debug {
    /// Persist a new record. Fails with `DuplicateKey` if the key exists.
    async fn create(&self, record: KeyRecord) -> Result<(), DomainError>;

    /// Fetch a record by its raw key.
    async fn get(&self, key: &str) -> Result<KeyRecord, DomainError>;

    /// Atomically decrement `remaining_usage` by one iff the key is neither
    /// revoked, expired, nor exhausted at `now`, checked in that precedence.
    /// Returns the updated record.
    async fn consume(&self, key: &str, now: DateTime<Utc>) -> Result<KeyRecord, DomainError>;

    /// Zero `remaining_usage` and stamp `revoked_at`. Idempotent: an already
    /// revoked record is returned unchanged.
    async fn revoke(&self, key: &str, now: DateTime<Utc>) -> Result<KeyRecord, DomainError>;

    /// Best-effort removal; a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), DomainError>;

    /// Remove up to `limit` records with `expires_at <= now`. Partial
    /// progress is acceptable; returns the number deleted.
    async fn delete_expired(&self, now: DateTime<Utc>, limit: u32) -> Result<u64, DomainError>;

    /// Count records that are non-revoked, non-expired, and have positive
    /// remaining usage at `now`.
    async fn count_active(&self, now: DateTime<Utc>) -> Result<u64, DomainError>;
}
