//! Reassembles an entity graph from storage.

use std::sync::Arc;

use modelsync_core::{EntityKind, SyncDirection, SyncResult, WorkspaceData, WorkspaceId};
use modelsync_store::StorageAdapter;

use crate::error::Result;

/// Reads a [`WorkspaceData`] back out of a [`StorageAdapter`].
///
/// Read-only. Never touches sync metadata.
pub struct Loader<A> {
    adapter: Arc<A>,
}

impl<A: StorageAdapter> Loader<A> {
    pub fn new(adapter: Arc<A>) -> Self {
        Self { adapter }
    }

    /// Load the graph for `workspace_id`, or `None` if no workspace row
    /// exists.
    ///
    /// Systems are gathered per loaded domain, so systems whose domain is
    /// missing are not returned.
    pub async fn load(&self, workspace_id: &WorkspaceId) -> Result<Option<WorkspaceData>> {
        let Some(workspace) = self.adapter.get_workspace_by_id(workspace_id).await? else {
            tracing::debug!(workspace = %workspace_id, "workspace not found");
            return Ok(None);
        };

        let domains = self.adapter.get_domains_by_workspace(workspace_id).await?;
        let tables = self.adapter.get_tables_by_workspace(workspace_id).await?;
        let relationships = self
            .adapter
            .get_relationships_by_workspace(workspace_id)
            .await?;

        let mut systems = Vec::new();
        for domain in &domains {
            systems.extend(self.adapter.get_systems_by_domain(&domain.id).await?);
        }

        tracing::debug!(
            workspace = %workspace_id,
            domains = domains.len(),
            tables = tables.len(),
            systems = systems.len(),
            relationships = relationships.len(),
            "loaded workspace"
        );

        Ok(Some(WorkspaceData {
            workspace,
            domains,
            tables,
            relationships,
            systems,
        }))
    }

    /// Like [`load`](Self::load), reported as a `db-to-yaml` [`SyncResult`].
    ///
    /// `processed` counts the loaded entities. A failed load is recorded as
    /// a workspace error instead of being returned.
    pub async fn load_with_result(
        &self,
        workspace_id: &WorkspaceId,
    ) -> (Option<WorkspaceData>, SyncResult) {
        let mut result = SyncResult::begin(SyncDirection::DbToYaml);

        let data = match self.load(workspace_id).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(workspace = %workspace_id, error = %e, "load failed");
                result.push_error(EntityKind::Workspace, workspace_id.as_str(), e.to_string());
                None
            }
        };

        if let Some(data) = &data {
            result.stats.domains.processed = data.domains.len() as u64;
            result.stats.tables.processed = data.tables.len() as u64;
            result.stats.systems.processed = data.systems.len() as u64;
            result.stats.relationships.processed = data.relationships.len() as u64;
        }

        (data, result.finish())
    }
}
