//! Storage contracts consumed by the sync engine.
//!
//! Both traits are async so SQLite (blocking, wrapped in `spawn_blocking`)
//! and natively async backends fit behind the same interface.

use async_trait::async_trait;
use modelsync_core::{
    Domain, DomainId, EntityKind, Relationship, RelationshipId, System, SystemId, Table, TableId,
    Workspace, WorkspaceId,
};

use crate::error::Result;
use crate::query::{QueryRows, SqlValue};

/// Persists and retrieves individual entities.
///
/// # Contract
///
/// - `initialize` must succeed before any other call; until then every call
///   fails with [`StoreError::Unavailable`](crate::StoreError::Unavailable).
///   The sync engine assumes the application has already initialized it.
/// - `save_*` upserts by id and stamps `updated_at` with the save time.
/// - `get_*_by_id` returns `Ok(None)` for unknown ids.
/// - List queries return entities in first-save order.
/// - Cross-entity references (`domain_id`, table ids on relationships) are
///   stored as given; no foreign keys are enforced.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Prepare the backend (open connections, run migrations). Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Whether `initialize` has completed and the backend is usable.
    fn is_initialized(&self) -> bool;

    // ─────────────────────────────────────────────────────────────────────────
    // Saves
    // ─────────────────────────────────────────────────────────────────────────

    async fn save_workspace(&self, workspace: &Workspace) -> Result<()>;

    async fn save_domain(&self, domain: &Domain) -> Result<()>;

    async fn save_table(&self, table: &Table) -> Result<()>;

    async fn save_system(&self, system: &System) -> Result<()>;

    async fn save_relationship(&self, relationship: &Relationship) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups by id
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_workspace_by_id(&self, id: &WorkspaceId) -> Result<Option<Workspace>>;

    async fn get_domain_by_id(&self, id: &DomainId) -> Result<Option<Domain>>;

    async fn get_table_by_id(&self, id: &TableId) -> Result<Option<Table>>;

    async fn get_system_by_id(&self, id: &SystemId) -> Result<Option<System>>;

    async fn get_relationship_by_id(&self, id: &RelationshipId) -> Result<Option<Relationship>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Scoped queries
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_domains_by_workspace(&self, workspace_id: &WorkspaceId) -> Result<Vec<Domain>>;

    async fn get_tables_by_workspace(&self, workspace_id: &WorkspaceId) -> Result<Vec<Table>>;

    async fn get_relationships_by_workspace(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<Relationship>>;

    async fn get_systems_by_domain(&self, domain_id: &DomainId) -> Result<Vec<System>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Derived
    // ─────────────────────────────────────────────────────────────────────────

    /// The `updated_at` marker of a stored row, or `None` if the row does not
    /// exist.
    async fn modified_at(&self, kind: EntityKind, id: &str) -> Result<Option<i64>> {
        let marker = match kind {
            EntityKind::Workspace => self
                .get_workspace_by_id(&WorkspaceId::from(id))
                .await?
                .and_then(|e| e.updated_at),
            EntityKind::Domain => self
                .get_domain_by_id(&DomainId::from(id))
                .await?
                .and_then(|e| e.updated_at),
            EntityKind::Table => self
                .get_table_by_id(&TableId::from(id))
                .await?
                .and_then(|e| e.updated_at),
            EntityKind::System => self
                .get_system_by_id(&SystemId::from(id))
                .await?
                .and_then(|e| e.updated_at),
            EntityKind::Relationship => self
                .get_relationship_by_id(&RelationshipId::from(id))
                .await?
                .and_then(|e| e.updated_at),
        };
        Ok(marker)
    }
}

/// Runs parameterized statements against the embedded database.
///
/// Parameters bind positionally to `?1`, `?2`, ...
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Run a statement that returns rows.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryRows>;

    /// Run a statement that returns no rows. Returns the number of rows
    /// changed.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;
}
