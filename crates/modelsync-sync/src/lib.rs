//! # modelsync Sync
//!
//! The three building blocks the sync engine composes:
//!
//! - [`SyncMetadataStore`] - per-file hashes and sync status, kept in the
//!   `sync_metadata` table through a [`QueryEngine`](modelsync_store::QueryEngine)
//! - [`Reconciler`] - writes an in-memory entity graph into storage, one
//!   entity at a time, isolating failures
//! - [`Loader`] - reassembles an entity graph from storage
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modelsync_core::{Workspace, WorkspaceData};
//! use modelsync_store::SqliteStore;
//! use modelsync_sync::{Loader, Reconciler};
//!
//! async fn example() -> modelsync_sync::Result<()> {
//!     let store = Arc::new(SqliteStore::open("workspace.db")?);
//!
//!     let data = WorkspaceData::new(Workspace::new("ws", "Analytics"));
//!     let result = Reconciler::new(Arc::clone(&store)).reconcile(&data).await;
//!     assert!(result.success);
//!
//!     let loaded = Loader::new(store).load(&"ws".into()).await?;
//!     assert!(loaded.is_some());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loader;
pub mod metadata;
pub mod reconciler;

pub use error::{Result, SyncError};
pub use loader::Loader;
pub use metadata::SyncMetadataStore;
pub use reconciler::Reconciler;
