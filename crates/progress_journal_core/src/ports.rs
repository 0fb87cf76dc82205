//! crates/progress_journal_core/src/ports.rs
//!
//! Defines the contracts (traits) the journal needs from its environment.
//! These traits form the boundary of the hexagonal architecture: the journal
//! is written against them and never against a concrete store, reader or clock.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::domain::RawFile;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors of the concrete collaborators.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Unsupported input: {0}")]
    Unsupported(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A durable key-value store holding whole serialized values under string keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if the key was never written.
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    /// Overwrites the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    /// Removes `key` entirely. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> PortResult<()>;
}

/// Turns an opaque uploaded file into a self-contained, embeddable payload.
#[async_trait]
pub trait FileReader: Send + Sync {
    /// Decodes `file` into a `data:` URI.
    async fn read_as_data_uri(&self, file: RawFile) -> PortResult<String>;
}

/// Source of the current wall-clock time in the user's offset.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}
