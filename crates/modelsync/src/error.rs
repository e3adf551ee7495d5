//! Error types for the sync engine.

use modelsync_sync::SyncError;
use thiserror::Error;

/// Errors returned by [`SyncEngine`](crate::SyncEngine) and its configuration.
///
/// Sync calls themselves report failures inside their
/// [`SyncResult`](modelsync_core::SyncResult); this type covers metadata
/// pass-throughs, loads, and configuration parsing.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Metadata or load error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl EngineError {
    /// True if the underlying storage could not be used at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EngineError::Sync(e) if e.is_unavailable())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
