//! API key infrastructure
//!
//! Key generation, the negative-decision cache, repository
//! implementations, the orchestration service, and the admin rate limiter.

mod cache;
mod generator;
mod in_memory;
mod postgres;
mod rate_limiter;
mod service;

pub use cache::DecisionCache;
pub use generator::{generate_key, hash_identifier};
pub use in_memory::InMemoryKeyRepository;
pub use postgres::PostgresKeyRepository;
pub use rate_limiter::{IpRateLimiter, DEFAULT_ADMIN_BURST, DEFAULT_ADMIN_RATE_PER_MINUTE};
pub use service::{
    Clock, IssueRequest, IssueResponse, KeyService, SystemClock, DEFAULT_CLEANUP_LIMIT,
    KEY_HASH_PREFIX_LEN, OPERATOR_HASH_PREFIX_LEN,
};
