//! # modelsync Core
//!
//! Pure primitives for modelsync: the entity graph, identifiers, content
//! hashing, and the value types exchanged by the sync engine.
//!
//! This crate contains no I/O, no storage, no async. Everything here is plain
//! data plus deterministic computation.
//!
//! ## Key Types
//!
//! - [`WorkspaceData`] - The in-memory entity graph passed to and returned from a sync
//! - [`Workspace`], [`Domain`], [`Table`], [`System`], [`Relationship`] - The entities
//! - [`EntityKind`] - Discriminator used in metadata rows and error records
//! - [`ContentHash`] - Blake3 digest of a file's content
//! - [`SyncMetadataEntry`] - Persisted bookkeeping for one file
//! - [`SyncResult`] - Report returned by every sync call

pub mod entity;
pub mod error;
pub mod hash;
pub mod ids;
pub mod metadata;
pub mod result;
pub mod time;

pub use entity::{Domain, EntityKind, Relationship, System, Table, Workspace, WorkspaceData};
pub use error::CoreError;
pub use hash::{hash_content, ContentHash};
pub use ids::{DomainId, RelationshipId, SystemId, TableId, WorkspaceId};
pub use metadata::{FileSyncStatus, MetadataStats, SyncMetadataEntry};
pub use result::{EntityCounters, EntityError, SyncDirection, SyncResult, SyncStats};
pub use time::now_millis;
