//! In-memory key repository implementation
//!
//! Backend for development and tests. Consume and revoke are linearized by
//! the write lock, which gives the same atomicity the transactional store
//! provides.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::api_key::{KeyRecord, KeyRepository};
use crate::domain::DomainError;

#[derive(Debug, Default)]
pub struct InMemoryKeyRepository {
    keys: RwLock<HashMap<String, KeyRecord>>,
}

impl InMemoryKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyRepository for InMemoryKeyRepository {
    async fn create(&self, record: KeyRecord) -> Result<(), DomainError> {
        let mut keys = self.keys.write().await;
        if keys.contains_key(&record.key) {
            return Err(DomainError::DuplicateKey);
        }
        keys.insert(record.key.clone(), record);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<KeyRecord, DomainError> {
        let keys = self.keys.read().await;
        keys.get(key).cloned().ok_or(DomainError::KeyNotFound)
    }

    async fn consume(&self, key: &str, now: DateTime<Utc>) -> Result<KeyRecord, DomainError> {
        let mut keys = self.keys.write().await;
        let record = keys.get_mut(key).ok_or(DomainError::KeyNotFound)?;

        if record.revoked_at.is_some() {
            return Err(DomainError::KeyRevoked);
        }
        if record.is_expired(now) {
            return Err(DomainError::KeyExpired);
        }
        if record.remaining_usage == 0 {
            return Err(DomainError::KeyExhausted);
        }

        record.remaining_usage -= 1;
        Ok(record.clone())
    }

    async fn revoke(&self, key: &str, now: DateTime<Utc>) -> Result<KeyRecord, DomainError> {
        let mut keys = self.keys.write().await;
        let record = keys.get_mut(key).ok_or(DomainError::KeyNotFound)?;

        if record.revoked_at.is_none() {
            record.remaining_usage = 0;
            record.revoked_at = Some(now);
        }
        Ok(record.clone())
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        self.keys.write().await.remove(key);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>, limit: u32) -> Result<u64, DomainError> {
        let mut keys = self.keys.write().await;
        let expired: Vec<String> = keys
            .iter()
            .filter(|(_, v)| v.is_expired(now))
            .take(limit as usize)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            keys.remove(key);
        }
        Ok(expired.len() as u64)
    }

    async fn count_active(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .filter(|v| v.revoked_at.is_none() && !v.is_expired(now) && v.remaining_usage > 0)
            .count() as u64)
    }
}
