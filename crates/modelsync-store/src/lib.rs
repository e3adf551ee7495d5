//! # modelsync Store
//!
//! Storage contracts for the sync engine and the embedded backends that
//! implement them.
//!
//! ## Overview
//!
//! The engine never talks to a database directly. It consumes two traits:
//!
//! - [`StorageAdapter`] - persists and retrieves individual entities
//! - [`QueryEngine`] - runs parameterized statements, used only for sync
//!   metadata bookkeeping
//!
//! [`SqliteStore`] implements both over a single embedded connection.
//! [`MemoryStore`] implements [`StorageAdapter`] for tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use modelsync_core::{Table, Workspace};
//! use modelsync_store::{SqliteStore, StorageAdapter};
//!
//! async fn example() -> modelsync_store::Result<()> {
//!     let store = SqliteStore::new("workspace.db");
//!     store.initialize().await?;
//!
//!     store.save_workspace(&Workspace::new("ws", "Analytics")).await?;
//!     store.save_table(&Table::new("t1", "ws", "d1", "orders")).await?;
//!
//!     let tables = store.get_tables_by_workspace(&"ws".into()).await?;
//!     assert_eq!(tables.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Upserts**: every `save_*` inserts or replaces by id
//! - **Modification marker**: saves stamp `updated_at` with the current time
//! - **Initialization**: every call before `initialize()` fails with
//!   [`StoreError::Unavailable`]
//! - **Stable order**: list queries return entities in first-save order

pub mod error;
pub mod memory;
pub mod migration;
pub mod query;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use query::{QueryRows, RowRef, SqlValue};
pub use sqlite::SqliteStore;
pub use traits::{QueryEngine, StorageAdapter};
