//! Validation outcomes for the key pipeline

use crate::domain::DomainError;

/// Result of validating (and consuming) an API key. Closed set; the HTTP
/// mapping lives in the API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationOutcome {
    Authorized,
    Unauthorized,
    Expired,
    Revoked,
    Exhausted,
    Error,
}

impl ValidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorized => "authorized",
            Self::Unauthorized => "unauthorized",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Exhausted => "exhausted",
            Self::Error => "error",
        }
    }

    /// Canonical user-facing message. Fixed strings; detail goes to logs.
    pub fn error_message(&self) -> &'static str {
        match self {
            Self::Authorized => "",
            Self::Unauthorized => "unauthorized",
            Self::Expired | Self::Revoked => "key inactive",
            Self::Exhausted => "usage limit reached",
            Self::Error => "service unavailable",
        }
    }

    /// Maps a repository error to its outcome. Anything outside the four
    /// logical key errors is a store failure.
    pub fn from_error(err: &DomainError) -> Self {
        match err {
            DomainError::KeyNotFound => Self::Unauthorized,
            DomainError::KeyExpired => Self::Expired,
            DomainError::KeyRevoked => Self::Revoked,
            DomainError::KeyExhausted => Self::Exhausted,
            _ => Self::Error,
        }
    }
}

impl std::fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
