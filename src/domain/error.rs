use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("api key not found")]
    KeyNotFound,

    #[error("api key expired")]
    KeyExpired,

    #[error("api key revoked")]
    KeyRevoked,

    #[error("api key usage exhausted")]
    KeyExhausted,

    #[error("api key already exists")]
    DuplicateKey,

    #[error("validation error: {message}")]
    Validation { message: String },

    /// Store failure worth retrying (connection loss, lock contention, timeout).
    #[error("store unavailable: {message}")]
    StoreTransient { message: String },

    /// Store failure that retrying cannot fix.
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn store_transient(message: impl Into<String>) -> Self {
        Self::StoreTransient {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Whether a bounded retry loop may attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreTransient { .. })
    }
}
