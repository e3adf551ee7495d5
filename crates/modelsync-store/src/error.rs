//! Error types for the store module.

use modelsync_core::EntityKind;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend is not initialized, was closed, or cannot be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Attribute serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid data in storage (unexpected column type, unknown enum text).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The backend refused to save an entity.
    #[error("{kind} {id} rejected: {reason}")]
    Rejected {
        kind: EntityKind,
        id: String,
        reason: String,
    },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking database task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// True if the error means the backend could not be used at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
