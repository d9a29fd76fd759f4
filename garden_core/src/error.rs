//! Error types for the garden_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for garden_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Start called while a session is already in flight
    #[error("A focus session is already in progress")]
    AlreadyInSession,

    /// Species missing from the catalog or not in the user's inventory
    #[error("Species '{0}' is not available to plant")]
    SpeciesUnavailable(String),

    /// Species missing from the catalog
    #[error("Unknown species '{0}'")]
    UnknownSpecies(String),

    /// No active session, or the session id doesn't match it
    #[error("No active session matches the given session id")]
    SessionMismatch,

    /// Purchase attempted without enough dew
    #[error("Insufficient dew: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// The read-modify-write lost a race with another writer
    #[error("Garden was modified concurrently, retry the operation")]
    ConcurrentModification,

    /// A datastore call exceeded its deadline
    #[error("Timed out waiting for the garden store")]
    Timeout,

    /// Request arguments out of range
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Persisted garden state is unreadable
    #[error("State error: {0}")]
    State(String),
}

impl Error {
    /// Whether the caller may retry the same operation unchanged
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ConcurrentModification | Error::Timeout)
    }
}
