//! # modelsync
//!
//! Keeps human-editable semantic model files and an embedded database
//! consistent.
//!
//! ## Overview
//!
//! The files are the source of truth. The engine receives their content
//! (for change detection) and the entity graph already parsed from them,
//! and:
//!
//! - **Detects changes** by comparing content hashes with those recorded
//!   at the last sync
//! - **Reconciles** the entity graph into the database, isolating
//!   per-entity failures
//! - **Loads** the entity graph back out of the database
//! - **Resolves conflicts** between edited files and edited database rows
//!   according to a [`ConflictStrategy`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modelsync::{EntityKind, FileSnapshot, FileSyncOutcome, SyncConfig, SyncEngine};
//! use modelsync::core::{Table, Workspace, WorkspaceData};
//! use modelsync::store::{SqliteStore, StorageAdapter};
//!
//! async fn example() -> modelsync::Result<()> {
//!     let store = Arc::new(SqliteStore::new("workspace.db"));
//!     store.initialize().await.map_err(modelsync::sync::SyncError::from)?;
//!
//!     let engine = SyncEngine::sqlite(store, SyncConfig::default());
//!
//!     let content = "name: orders\n";
//!     let mut data = WorkspaceData::new(Workspace::new("ws", "Analytics"));
//!     data.tables.push(Table::new("orders", "ws", "sales", "orders"));
//!
//!     let path = "models/orders.yaml";
//!     let snapshot = FileSnapshot::new(path, EntityKind::Table, "orders", content);
//!     match engine.sync_file(&snapshot, &data).await {
//!         FileSyncOutcome::Synced(result) => assert!(result.success),
//!         other => println!("{:?}", other),
//!     }
//!
//!     assert!(!engine.has_file_changed(path, content).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `modelsync::core` - Entities, ids, hashing, result types
//! - `modelsync::store` - Storage contracts, SQLite and in-memory backends
//! - `modelsync::sync` - Metadata store, reconciler, loader

pub mod cell;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;

// Re-export component crates
pub use modelsync_core as core;
pub use modelsync_store as store;
pub use modelsync_sync as sync;

// Re-export main types for convenience
pub use cell::EngineCell;
pub use config::SyncConfig;
pub use conflict::{ConflictReport, ConflictStrategy, FileSnapshot, FileSyncOutcome, Resolution};
pub use engine::{SyncEngine, SyncStatus};
pub use error::{EngineError, Result};

// Re-export commonly used core types
pub use modelsync_core::{
    hash_content, EntityKind, FileSyncStatus, MetadataStats, SyncDirection, SyncMetadataEntry,
    SyncResult, WorkspaceData, WorkspaceId,
};
