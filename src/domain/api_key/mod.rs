//! API key domain
//!
//! Domain types and traits for the two-tier key model: the persisted
//! temporary key record, its derived lifecycle status, the closed set of
//! validation outcomes, and the repository contract.

mod entity;
mod outcome;
mod repository;

pub use entity::{KeyRecord, KeyStatus, KeyType};
pub use outcome::ValidationOutcome;
pub use repository::KeyRepository;

#[cfg(test)]
pub use repository::mock::MockKeyRepository;
