//! In-memory implementation of the StorageAdapter trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! (upsert by id, first-save ordering, `updated_at` stamping) but keeps
//! everything in memory with no persistence.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use modelsync_core::{
    now_millis, Domain, DomainId, Relationship, RelationshipId, System, SystemId, Table, TableId,
    Workspace, WorkspaceId,
};

use crate::error::{Result, StoreError};
use crate::traits::StorageAdapter;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    initialized: AtomicBool,
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    workspaces: Collection<WorkspaceId, Workspace>,
    domains: Collection<DomainId, Domain>,
    tables: Collection<TableId, Table>,
    systems: Collection<SystemId, System>,
    relationships: Collection<RelationshipId, Relationship>,
}

/// Insertion-ordered map: upserts keep the slot of the first save.
struct Collection<K, V> {
    items: Vec<V>,
    index: HashMap<K, usize>,
}

impl<K, V> Default for Collection<K, V> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V: Clone> Collection<K, V> {
    fn upsert(&mut self, key: K, value: V) {
        match self.index.get(&key) {
            Some(&slot) => self.items[slot] = value,
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(value);
            }
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.index.get(key).map(|&slot| self.items[slot].clone())
    }

    fn filter(&self, pred: impl Fn(&V) -> bool) -> Vec<V> {
        self.items.iter().filter(|v| pred(v)).cloned().collect()
    }
}

impl MemoryStore {
    /// Create a new empty, initialized in-memory store.
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(true),
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Create a store that rejects every call until `initialize` is called.
    pub fn uninitialized() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Make the store unavailable again, keeping its data.
    pub fn shutdown(&self) {
        self.initialized.store(false, Ordering::SeqCst);
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store not initialized".into()))
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.ensure_ready()?;
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.ensure_ready()?;
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStore {
    async fn initialize(&self) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn save_workspace(&self, workspace: &Workspace) -> Result<()> {
        let mut stored = workspace.clone();
        stored.updated_at = Some(now_millis());
        self.write()?.workspaces.upsert(stored.id.clone(), stored);
        Ok(())
    }

    async fn save_domain(&self, domain: &Domain) -> Result<()> {
        let mut stored = domain.clone();
        stored.updated_at = Some(now_millis());
        self.write()?.domains.upsert(stored.id.clone(), stored);
        Ok(())
    }

    async fn save_table(&self, table: &Table) -> Result<()> {
        let mut stored = table.clone();
        stored.updated_at = Some(now_millis());
        self.write()?.tables.upsert(stored.id.clone(), stored);
        Ok(())
    }

    async fn save_system(&self, system: &System) -> Result<()> {
        let mut stored = system.clone();
        stored.updated_at = Some(now_millis());
        self.write()?.systems.upsert(stored.id.clone(), stored);
        Ok(())
    }

    async fn save_relationship(&self, relationship: &Relationship) -> Result<()> {
        let mut stored = relationship.clone();
        stored.updated_at = Some(now_millis());
        self.write()?.relationships.upsert(stored.id.clone(), stored);
        Ok(())
    }

    async fn get_workspace_by_id(&self, id: &WorkspaceId) -> Result<Option<Workspace>> {
        Ok(self.read()?.workspaces.get(id))
    }

    async fn get_domain_by_id(&self, id: &DomainId) -> Result<Option<Domain>> {
        Ok(self.read()?.domains.get(id))
    }

    async fn get_table_by_id(&self, id: &TableId) -> Result<Option<Table>> {
        Ok(self.read()?.tables.get(id))
    }

    async fn get_system_by_id(&self, id: &SystemId) -> Result<Option<System>> {
        Ok(self.read()?.systems.get(id))
    }

    async fn get_relationship_by_id(&self, id: &RelationshipId) -> Result<Option<Relationship>> {
        Ok(self.read()?.relationships.get(id))
    }

    async fn get_domains_by_workspace(&self, workspace_id: &WorkspaceId) -> Result<Vec<Domain>> {
        Ok(self
            .read()?
            .domains
            .filter(|d| &d.workspace_id == workspace_id))
    }

    async fn get_tables_by_workspace(&self, workspace_id: &WorkspaceId) -> Result<Vec<Table>> {
        Ok(self
            .read()?
            .tables
            .filter(|t| &t.workspace_id == workspace_id))
    }

    async fn get_relationships_by_workspace(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<Relationship>> {
        Ok(self
            .read()?
            .relationships
            .filter(|r| &r.workspace_id == workspace_id))
    }

    async fn get_systems_by_domain(&self, domain_id: &DomainId) -> Result<Vec<System>> {
        Ok(self.read()?.systems.filter(|s| &s.domain_id == domain_id))
    }
}
