//! Domain layer - core entities and contracts

pub mod api_key;
pub mod document;
pub mod error;

pub use api_key::{KeyRecord, KeyRepository, KeyStatus, KeyType, ValidationOutcome};
pub use document::{ConvertError, DocumentOpener, PageDocument};
pub use error::DomainError;
