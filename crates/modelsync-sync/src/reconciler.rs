//! Writes an in-memory entity graph into storage.
//!
//! The workspace row goes first, then domains, tables, systems and
//! relationships, each collection in the order given. Every entity is looked
//! up and saved on its own; a failure is recorded against that entity and
//! the pass moves on.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use modelsync_core::{
    Domain, EntityCounters, EntityKind, Relationship, SyncDirection, SyncResult, System, Table,
    WorkspaceData,
};
use modelsync_store::{Result as StoreResult, StorageAdapter};

/// One entity the reconciler knows how to persist.
#[async_trait]
trait Persist: Sync {
    const KIND: EntityKind;

    fn key(&self) -> &str;

    async fn exists(&self, adapter: &dyn StorageAdapter) -> StoreResult<bool>;

    async fn save(&self, adapter: &dyn StorageAdapter) -> StoreResult<()>;
}

#[async_trait]
impl Persist for Domain {
    const KIND: EntityKind = EntityKind::Domain;

    fn key(&self) -> &str {
        self.id.as_str()
    }

    async fn exists(&self, adapter: &dyn StorageAdapter) -> StoreResult<bool> {
        Ok(adapter.get_domain_by_id(&self.id).await?.is_some())
    }

    async fn save(&self, adapter: &dyn StorageAdapter) -> StoreResult<()> {
        adapter.save_domain(self).await
    }
}

#[async_trait]
impl Persist for Table {
    const KIND: EntityKind = EntityKind::Table;

    fn key(&self) -> &str {
        self.id.as_str()
    }

    async fn exists(&self, adapter: &dyn StorageAdapter) -> StoreResult<bool> {
        Ok(adapter.get_table_by_id(&self.id).await?.is_some())
    }

    async fn save(&self, adapter: &dyn StorageAdapter) -> StoreResult<()> {
        adapter.save_table(self).await
    }
}

#[async_trait]
impl Persist for System {
    const KIND: EntityKind = EntityKind::System;

    fn key(&self) -> &str {
        self.id.as_str()
    }

    async fn exists(&self, adapter: &dyn StorageAdapter) -> StoreResult<bool> {
        Ok(adapter.get_system_by_id(&self.id).await?.is_some())
    }

    async fn save(&self, adapter: &dyn StorageAdapter) -> StoreResult<()> {
        adapter.save_system(self).await
    }
}

#[async_trait]
impl Persist for Relationship {
    const KIND: EntityKind = EntityKind::Relationship;

    fn key(&self) -> &str {
        self.id.as_str()
    }

    async fn exists(&self, adapter: &dyn StorageAdapter) -> StoreResult<bool> {
        Ok(adapter.get_relationship_by_id(&self.id).await?.is_some())
    }

    async fn save(&self, adapter: &dyn StorageAdapter) -> StoreResult<()> {
        adapter.save_relationship(self).await
    }
}

/// Applies a [`WorkspaceData`] to a [`StorageAdapter`].
pub struct Reconciler<A> {
    adapter: Arc<A>,
    debug: bool,
}

impl<A: StorageAdapter> Reconciler<A> {
    pub fn new(adapter: Arc<A>) -> Self {
        Self {
            adapter,
            debug: false,
        }
    }

    /// Log every entity outcome at debug level.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Save every entity in `data`.
    ///
    /// Never fails as a whole: lookup and save errors land in
    /// [`SyncResult::errors`] and `success` is false if there are any.
    /// Entities already saved are not rolled back.
    pub async fn reconcile(&self, data: &WorkspaceData) -> SyncResult {
        let mut result = SyncResult::begin(SyncDirection::YamlToDb);
        let workspace_id = data.workspace.id.as_str();

        tracing::info!(
            workspace = workspace_id,
            entities = data.total_entities(),
            "reconciling workspace"
        );

        if let Err(e) = self.adapter.save_workspace(&data.workspace).await {
            tracing::warn!(workspace = workspace_id, error = %e, "workspace save failed");
            result.push_error(EntityKind::Workspace, workspace_id, e.to_string());
        }

        self.reconcile_collection(&data.domains, &mut result).await;
        self.reconcile_collection(&data.tables, &mut result).await;
        self.reconcile_collection(&data.systems, &mut result).await;
        self.reconcile_collection(&data.relationships, &mut result).await;

        let result = result.finish();
        tracing::info!(
            workspace = workspace_id,
            success = result.success,
            processed = result.stats.total_processed(),
            added = result.stats.total_added(),
            updated = result.stats.total_updated(),
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "reconcile finished"
        );
        result
    }

    async fn reconcile_collection<E: Persist>(&self, items: &[E], result: &mut SyncResult) {
        let mut seen = HashSet::with_capacity(items.len());

        for item in items {
            let id = item.key();
            if !seen.insert(id) {
                result.push_warning(format!(
                    "duplicate {} id {}: later entry overwrites earlier one",
                    E::KIND,
                    id
                ));
            }

            let outcome = self.persist(item).await;
            bump(result, E::KIND, |c| c.processed += 1);

            match outcome {
                Ok(true) => {
                    bump(result, E::KIND, |c| c.added += 1);
                    self.log_saved(E::KIND, id, "added");
                }
                Ok(false) => {
                    bump(result, E::KIND, |c| c.updated += 1);
                    self.log_saved(E::KIND, id, "updated");
                }
                Err(e) => {
                    tracing::warn!(kind = %E::KIND, id, error = %e, "entity save failed");
                    result.push_error(E::KIND, id, e.to_string());
                }
            }
        }
    }

    /// Returns whether the entity was new.
    async fn persist<E: Persist>(&self, item: &E) -> StoreResult<bool> {
        let adapter: &dyn StorageAdapter = self.adapter.as_ref();
        let existed = item.exists(adapter).await?;
        item.save(adapter).await?;
        Ok(!existed)
    }

    fn log_saved(&self, kind: EntityKind, id: &str, outcome: &'static str) {
        if self.debug {
            tracing::debug!(%kind, id, outcome, "entity saved");
        } else {
            tracing::trace!(%kind, id, outcome, "entity saved");
        }
    }
}

fn bump(result: &mut SyncResult, kind: EntityKind, f: impl FnOnce(&mut EntityCounters)) {
    if let Some(counters) = result.stats.counters_mut(kind) {
        f(counters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelsync_core::{SyncStats, Workspace};
    use modelsync_store::MemoryStore;
    use modelsync_testkit::{
        generators, init_tracing, orders_workspace, FailingAdapter, WorkspaceBuilder,
    };
    use proptest::prelude::*;

    fn three_tables() -> WorkspaceData {
        WorkspaceBuilder::new("ws", "W")
            .domain("d1", "Sales")
            .table("t1", "d1", "orders")
            .table("t2", "d1", "customers")
            .table("t3", "d1", "invoices")
            .build()
    }

    #[tokio::test]
    async fn test_orphan_table_is_accepted() {
        init_tracing();
        let reconciler = Reconciler::new(Arc::new(MemoryStore::new())).with_debug(true);

        let result = reconciler.reconcile(&orders_workspace()).await;

        assert!(result.success);
        assert!(result.errors.is_empty());
        assert_eq!(result.direction, SyncDirection::YamlToDb);
        assert_eq!(result.stats.domains_processed(), 1);
        assert_eq!(result.stats.tables_processed(), 2);
        assert_eq!(result.stats.tables_added(), 2);
        assert_eq!(result.stats.systems_processed(), 0);
        assert_eq!(result.stats.relationships_processed(), 0);
    }

    #[tokio::test]
    async fn test_second_sync_updates_everything() {
        let reconciler = Reconciler::new(Arc::new(MemoryStore::new()));
        let data = three_tables();

        let first = reconciler.reconcile(&data).await;
        assert_eq!(first.stats.tables_added(), 3);
        assert_eq!(first.stats.domains.added, 1);
        assert_eq!(first.stats.total_updated(), 0);

        let second = reconciler.reconcile(&data).await;
        assert_eq!(second.stats.total_added(), 0);
        assert_eq!(second.stats.tables_updated(), 3);
        assert_eq!(second.stats.domains.updated, 1);
    }

    #[tokio::test]
    async fn test_one_failing_table_is_isolated() {
        let adapter = Arc::new(FailingAdapter::new(MemoryStore::new()));
        adapter.fail_saves_for(EntityKind::Table, "t2");
        let reconciler = Reconciler::new(Arc::clone(&adapter));

        let result = reconciler.reconcile(&three_tables()).await;

        assert!(!result.success);
        assert_eq!(result.stats.tables_processed(), 3);
        assert_eq!(result.stats.tables_added(), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].entity_type, EntityKind::Table);
        assert_eq!(result.errors[0].entity_id, "t2");

        // Entities after the failure were still written.
        assert!(adapter.inner().get_table_by_id(&"t3".into()).await.unwrap().is_some());
        assert!(adapter.inner().get_table_by_id(&"t2".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_collections_saved_in_fixed_order() {
        let adapter = Arc::new(FailingAdapter::new(MemoryStore::new()));
        let reconciler = Reconciler::new(Arc::clone(&adapter));
        let data = WorkspaceBuilder::new("ws", "W")
            .relationship("r2", "d2", "t9", "t1")
            .system("s2", "d1", "crm")
            .table("t9", "d2", "refunds")
            .domain("d2", "Support")
            .relationship("r1", "d1", "t1", "t9")
            .table("t1", "d1", "orders")
            .system("s1", "d2", "erp")
            .domain("d1", "Sales")
            .build();

        let result = reconciler.reconcile(&data).await;
        assert!(result.success);

        let expected: Vec<(EntityKind, String)> = [
            (EntityKind::Workspace, "ws"),
            (EntityKind::Domain, "d2"),
            (EntityKind::Domain, "d1"),
            (EntityKind::Table, "t9"),
            (EntityKind::Table, "t1"),
            (EntityKind::System, "s2"),
            (EntityKind::System, "s1"),
            (EntityKind::Relationship, "r2"),
            (EntityKind::Relationship, "r1"),
        ]
        .into_iter()
        .map(|(kind, id)| (kind, id.to_string()))
        .collect();
        assert_eq!(adapter.save_log(), expected);
    }

    #[tokio::test]
    async fn test_workspace_failure_is_recorded_but_not_counted() {
        let adapter = Arc::new(FailingAdapter::new(MemoryStore::new()));
        adapter.fail_saves_for(EntityKind::Workspace, "ws");
        let reconciler = Reconciler::new(adapter);

        let result = reconciler.reconcile(&three_tables()).await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].entity_type, EntityKind::Workspace);
        assert_eq!(result.stats.tables_added(), 3);
    }

    #[tokio::test]
    async fn test_unavailable_storage_fails_every_entity() {
        let adapter = Arc::new(FailingAdapter::new(MemoryStore::new()));
        adapter.set_unavailable(true);
        let reconciler = Reconciler::new(adapter);

        let result = reconciler.reconcile(&three_tables()).await;

        assert!(!result.success);
        // Workspace, one domain, three tables.
        assert_eq!(result.errors.len(), 5);
        assert_eq!(result.stats.tables_processed(), 3);
        assert_eq!(result.stats.total_added(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_ids_warn_and_last_wins() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(Arc::clone(&store));
        let data = WorkspaceBuilder::new("ws", "W")
            .table("t1", "d1", "first")
            .table("t1", "d1", "second")
            .build();

        let result = reconciler.reconcile(&data).await;

        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.stats.tables_added(), 1);
        assert_eq!(result.stats.tables_updated(), 1);
        let stored = store.get_table_by_id(&"t1".into()).await.unwrap().unwrap();
        assert_eq!(stored.name, "second");
    }

    #[tokio::test]
    async fn test_empty_workspace() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(Arc::clone(&store));

        let data = WorkspaceData::new(Workspace::new("empty", "Empty"));
        let result = reconciler.reconcile(&data).await;

        assert!(result.success);
        assert_eq!(result.stats, SyncStats::default());
        assert!(store.get_workspace_by_id(&"empty".into()).await.unwrap().is_some());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn processed_counts_match_input(data in generators::workspace_data()) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let result = runtime.block_on(async {
                Reconciler::new(Arc::new(MemoryStore::new())).reconcile(&data).await
            });

            prop_assert_eq!(result.stats.domains_processed(), data.domains.len() as u64);
            prop_assert_eq!(result.stats.tables_processed(), data.tables.len() as u64);
            prop_assert_eq!(result.stats.systems_processed(), data.systems.len() as u64);
            prop_assert_eq!(
                result.stats.relationships_processed(),
                data.relationships.len() as u64
            );
            prop_assert!(result.success);
        }
    }
}
