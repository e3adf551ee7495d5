//! Error types for modelsync core.

use thiserror::Error;

/// Errors raised while parsing core value types from their stored form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown entity kind: {0}")]
    InvalidEntityKind(String),

    #[error("unknown sync status: {0}")]
    InvalidSyncStatus(String),

    #[error("invalid content hash: {0}")]
    InvalidHash(String),
}
