//! Short-lived cache of negative validation decisions
//!
//! Stores only denials; authorized results always go back through the store
//! so the consume transaction keeps its at-most-once guarantee.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::api_key::ValidationOutcome;

#[derive(Debug, Clone, Copy)]
struct CachedDecision {
    outcome: ValidationOutcome,
    expires_at: DateTime<Utc>,
}

/// TTL map from raw key to its last negative outcome. Expired entries are
/// evicted on read. The caller supplies `now` so TTL behavior stays
/// deterministic under a test clock.
#[derive(Debug, Default)]
pub struct DecisionCache {
    data: RwLock<HashMap<String, CachedDecision>>,
}

impl DecisionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str, now: DateTime<Utc>) -> Option<ValidationOutcome> {
        let expired = {
            let data = self.data.read().await;
            match data.get(key) {
                Some(entry) if now <= entry.expires_at => return Some(entry.outcome),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.delete(key).await;
        }
        None
    }

    pub async fn set(
        &self,
        key: &str,
        outcome: ValidationOutcome,
        ttl: Duration,
        now: DateTime<Utc>,
    ) {
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        self.data.write().await.insert(
            key.to_string(),
            CachedDecision {
                outcome,
                expires_at,
            },
        );
    }

    pub async fn delete(&self, key: &str) {
        self.data.write().await.remove(key);
    }
}
