//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use serde_json::json;

use modelsync_core::{
    Domain, DomainId, Relationship, System, Table, Workspace, WorkspaceData, WorkspaceId,
};

/// Install a test-friendly tracing subscriber.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Builds a [`WorkspaceData`] entity by entity.
///
/// Every entity is scoped to the builder's workspace. Collections keep the
/// order in which entities were added.
pub struct WorkspaceBuilder {
    data: WorkspaceData,
}

impl WorkspaceBuilder {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            data: WorkspaceData::new(Workspace::new(id, name)),
        }
    }

    fn workspace_id(&self) -> WorkspaceId {
        self.data.workspace.id.clone()
    }

    pub fn domain(mut self, id: &str, name: &str) -> Self {
        let domain = Domain::new(id, self.workspace_id(), name);
        self.data.domains.push(domain);
        self
    }

    /// Add a table. `domain_id` need not name a domain in this builder.
    pub fn table(mut self, id: &str, domain_id: &str, name: &str) -> Self {
        let table = Table::new(id, self.workspace_id(), domain_id, name)
            .with_attributes(json!({ "columns": [{ "name": "id", "type": "bigint" }] }));
        self.data.tables.push(table);
        self
    }

    pub fn system(mut self, id: &str, domain_id: &str, name: &str) -> Self {
        let system = System::new(id, self.workspace_id(), domain_id, name);
        self.data.systems.push(system);
        self
    }

    pub fn relationship(mut self, id: &str, domain_id: &str, source: &str, target: &str) -> Self {
        let relationship = Relationship::new(id, self.workspace_id(), domain_id, source, target);
        self.data.relationships.push(relationship);
        self
    }

    pub fn build(self) -> WorkspaceData {
        self.data
    }
}

/// One domain, two tables (one of them orphaned), nothing else.
pub fn orders_workspace() -> WorkspaceData {
    WorkspaceBuilder::new("ws-orders", "Orders")
        .domain("sales", "Sales")
        .table("orders", "sales", "orders")
        .table("legacy_orders", "archived", "legacy_orders")
        .build()
}

/// Domain id used by the orphaned table in [`orders_workspace`].
pub fn orphan_domain() -> DomainId {
    DomainId::from("archived")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_scopes_to_workspace() {
        let data = WorkspaceBuilder::new("ws", "W")
            .domain("d1", "D")
            .table("t1", "d1", "orders")
            .system("s1", "d1", "etl")
            .relationship("r1", "d1", "t1", "t1")
            .build();

        assert_eq!(data.total_entities(), 4);
        assert!(data.tables.iter().all(|t| t.workspace_id.as_str() == "ws"));
        assert_eq!(data.relationships[0].source_table_id.as_str(), "t1");
    }

    #[test]
    fn test_orders_workspace_has_orphan() {
        let data = orders_workspace();
        assert_eq!(data.domains.len(), 1);
        assert_eq!(data.tables.len(), 2);
        assert!(!data.domains.iter().any(|d| d.id == orphan_domain()));
        assert_eq!(data.tables[1].domain_id, orphan_domain());
    }
}
