//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur during metadata and load operations.
///
/// Reconciliation never returns this type: per-entity failures are recorded
/// in the [`SyncResult`](modelsync_core::SyncResult) instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] modelsync_store::StoreError),

    /// A stored value could not be interpreted (unknown status or resource
    /// type text).
    #[error("invalid stored value: {0}")]
    Core(#[from] modelsync_core::CoreError),
}

impl SyncError {
    /// True if the underlying storage could not be used at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SyncError::Store(e) if e.is_unavailable())
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
