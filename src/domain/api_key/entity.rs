//! Temporary API key record and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of an API key. Only temporary keys are persisted; static keys live
/// in configuration and never reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    #[default]
    Temporary,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporary => "temporary",
        }
    }
}

/// Lifecycle state of a key as exposed to operators. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Active,
    Expired,
    Exhausted,
    Revoked,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Exhausted => "exhausted",
            Self::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted record for a temporary key. The raw key doubles as the
/// storage identifier. The persisted shape is fixed for
/// cross-implementation compatibility; the field travels as `type`, which
/// is a reserved word in Rust, hence `kind` here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: KeyType,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_usage: u32,
    pub remaining_usage: u32,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl KeyRecord {
    /// Derived lifecycle status at the provided instant. Precedence:
    /// revoked, then expired, then exhausted, then active.
    pub fn status(&self, now: DateTime<Utc>) -> KeyStatus {
        if self.revoked_at.is_some() {
            return KeyStatus::Revoked;
        }
        if self.is_expired(now) {
            return KeyStatus::Expired;
        }
        if self.remaining_usage == 0 {
            return KeyStatus::Exhausted;
        }
        KeyStatus::Active
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
