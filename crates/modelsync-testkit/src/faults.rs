//! Fault injection for storage adapters.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use modelsync_core::{
    Domain, DomainId, EntityKind, Relationship, RelationshipId, System, SystemId, Table, TableId,
    Workspace, WorkspaceId,
};
use modelsync_store::{Result, StorageAdapter, StoreError};

/// Wraps a [`StorageAdapter`] and fails selected calls.
///
/// Saves for ids registered with [`fail_saves_for`](Self::fail_saves_for)
/// return [`StoreError::Rejected`]. While [`set_unavailable`](Self::set_unavailable)
/// is on, every call fails with [`StoreError::Unavailable`] and the adapter
/// reports itself uninitialized. Everything else is forwarded.
///
/// Every attempted save is logged in call order, see
/// [`save_log`](Self::save_log).
pub struct FailingAdapter<A> {
    inner: A,
    failing: Mutex<HashSet<(EntityKind, String)>>,
    unavailable: AtomicBool,
    saves: AtomicU64,
    log: Mutex<Vec<(EntityKind, String)>>,
}

impl<A: StorageAdapter> FailingAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            unavailable: AtomicBool::new(false),
            saves: AtomicU64::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Make every save of this entity fail.
    pub fn fail_saves_for(&self, kind: EntityKind, id: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((kind, id.to_string()));
    }

    pub fn clear_failures(&self) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of save calls that reached the inner adapter.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// `(kind, id)` of every save attempted while available, oldest first.
    /// Rejected saves are included.
    pub fn save_log(&self) -> Vec<(EntityKind, String)> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_save_log(&self) {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected outage".into()))
        } else {
            Ok(())
        }
    }

    fn check_save(&self, kind: EntityKind, id: &str) -> Result<()> {
        self.check_available()?;
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((kind, id.to_string()));
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(kind, id.to_string()));
        if failing {
            return Err(StoreError::Rejected {
                kind,
                id: id.to_string(),
                reason: "injected failure".into(),
            });
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl<A: StorageAdapter> StorageAdapter for FailingAdapter<A> {
    async fn initialize(&self) -> Result<()> {
        self.check_available()?;
        self.inner.initialize().await
    }

    fn is_initialized(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst) && self.inner.is_initialized()
    }

    async fn save_workspace(&self, workspace: &Workspace) -> Result<()> {
        self.check_save(EntityKind::Workspace, workspace.id.as_str())?;
        self.inner.save_workspace(workspace).await
    }

    async fn save_domain(&self, domain: &Domain) -> Result<()> {
        self.check_save(EntityKind::Domain, domain.id.as_str())?;
        self.inner.save_domain(domain).await
    }

    async fn save_table(&self, table: &Table) -> Result<()> {
        self.check_save(EntityKind::Table, table.id.as_str())?;
        self.inner.save_table(table).await
    }

    async fn save_system(&self, system: &System) -> Result<()> {
        self.check_save(EntityKind::System, system.id.as_str())?;
        self.inner.save_system(system).await
    }

    async fn save_relationship(&self, relationship: &Relationship) -> Result<()> {
        self.check_save(EntityKind::Relationship, relationship.id.as_str())?;
        self.inner.save_relationship(relationship).await
    }

    async fn get_workspace_by_id(&self, id: &WorkspaceId) -> Result<Option<Workspace>> {
        self.check_available()?;
        self.inner.get_workspace_by_id(id).await
    }

    async fn get_domain_by_id(&self, id: &DomainId) -> Result<Option<Domain>> {
        self.check_available()?;
        self.inner.get_domain_by_id(id).await
    }

    async fn get_table_by_id(&self, id: &TableId) -> Result<Option<Table>> {
        self.check_available()?;
        self.inner.get_table_by_id(id).await
    }

    async fn get_system_by_id(&self, id: &SystemId) -> Result<Option<System>> {
        self.check_available()?;
        self.inner.get_system_by_id(id).await
    }

    async fn get_relationship_by_id(&self, id: &RelationshipId) -> Result<Option<Relationship>> {
        self.check_available()?;
        self.inner.get_relationship_by_id(id).await
    }

    async fn get_domains_by_workspace(&self, workspace_id: &WorkspaceId) -> Result<Vec<Domain>> {
        self.check_available()?;
        self.inner.get_domains_by_workspace(workspace_id).await
    }

    async fn get_tables_by_workspace(&self, workspace_id: &WorkspaceId) -> Result<Vec<Table>> {
        self.check_available()?;
        self.inner.get_tables_by_workspace(workspace_id).await
    }

    async fn get_relationships_by_workspace(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<Relationship>> {
        self.check_available()?;
        self.inner.get_relationships_by_workspace(workspace_id).await
    }

    async fn get_systems_by_domain(&self, domain_id: &DomainId) -> Result<Vec<System>> {
        self.check_available()?;
        self.inner.get_systems_by_domain(domain_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelsync_store::MemoryStore;

    #[tokio::test]
    async fn test_fails_only_registered_ids() {
        let adapter = FailingAdapter::new(MemoryStore::new());
        adapter.fail_saves_for(EntityKind::Table, "bad");

        adapter.save_table(&Table::new("good", "ws", "d", "a")).await.unwrap();
        let err = adapter
            .save_table(&Table::new("bad", "ws", "d", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { ref id, .. } if id == "bad"));
        assert_eq!(adapter.save_count(), 1);
        assert_eq!(
            adapter.save_log(),
            vec![
                (EntityKind::Table, "good".to_string()),
                (EntityKind::Table, "bad".to_string()),
            ]
        );

        // Same id under another kind is unaffected.
        adapter.save_domain(&Domain::new("bad", "ws", "D")).await.unwrap();
    }

    #[tokio::test]
    async fn test_outage_blocks_everything() {
        let adapter = FailingAdapter::new(MemoryStore::new());
        adapter.set_unavailable(true);

        assert!(!adapter.is_initialized());
        assert!(adapter
            .get_workspace_by_id(&"ws".into())
            .await
            .unwrap_err()
            .is_unavailable());

        adapter.set_unavailable(false);
        assert!(adapter.is_initialized());
        assert!(adapter.get_workspace_by_id(&"ws".into()).await.unwrap().is_none());
    }
}
