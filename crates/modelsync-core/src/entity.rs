//! The entity graph: workspaces, domains, tables, systems, relationships.
//!
//! Entity-specific attributes (columns, descriptions, owners, diagram
//! positions, ...) are opaque to the sync engine and travel as a JSON value.
//! Only identity and scoping fields are typed.
//!
//! `updated_at` is the modification marker of the database row. Storage
//! adapters overwrite it with the save time; values supplied by callers are
//! ignored on save.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::ids::{DomainId, RelationshipId, SystemId, TableId, WorkspaceId};

fn empty_attributes() -> Value {
    Value::Object(serde_json::Map::new())
}

/// The kind of resource a file or error record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Workspace,
    Domain,
    Table,
    System,
    Relationship,
}

impl EntityKind {
    /// Stable lowercase name, as stored in `sync_metadata.resource_type`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Workspace => "workspace",
            EntityKind::Domain => "domain",
            EntityKind::Table => "table",
            EntityKind::System => "system",
            EntityKind::Relationship => "relationship",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workspace" => Ok(EntityKind::Workspace),
            "domain" => Ok(EntityKind::Domain),
            "table" => Ok(EntityKind::Table),
            "system" => Ok(EntityKind::System),
            "relationship" => Ok(EntityKind::Relationship),
            other => Err(CoreError::InvalidEntityKind(other.to_string())),
        }
    }
}

/// Top-level container. Holds identity metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    #[serde(default = "empty_attributes")]
    pub attributes: Value,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl Workspace {
    pub fn new(id: impl Into<WorkspaceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            attributes: empty_attributes(),
            updated_at: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }
}

/// A named grouping of tables and systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    #[serde(default = "empty_attributes")]
    pub attributes: Value,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl Domain {
    pub fn new(
        id: impl Into<DomainId>,
        workspace_id: impl Into<WorkspaceId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            name: name.into(),
            attributes: empty_attributes(),
            updated_at: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }
}

/// A table definition belonging to a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub workspace_id: WorkspaceId,
    pub domain_id: DomainId,
    pub name: String,
    #[serde(default = "empty_attributes")]
    pub attributes: Value,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl Table {
    pub fn new(
        id: impl Into<TableId>,
        workspace_id: impl Into<WorkspaceId>,
        domain_id: impl Into<DomainId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            domain_id: domain_id.into(),
            name: name.into(),
            attributes: empty_attributes(),
            updated_at: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }
}

/// A system (application, pipeline, service) attached to a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct System {
    pub id: SystemId,
    pub workspace_id: WorkspaceId,
    pub domain_id: DomainId,
    pub name: String,
    #[serde(default = "empty_attributes")]
    pub attributes: Value,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl System {
    pub fn new(
        id: impl Into<SystemId>,
        workspace_id: impl Into<WorkspaceId>,
        domain_id: impl Into<DomainId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            domain_id: domain_id.into(),
            name: name.into(),
            attributes: empty_attributes(),
            updated_at: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }
}

/// A directed relationship between two tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub workspace_id: WorkspaceId,
    pub domain_id: DomainId,
    pub source_table_id: TableId,
    pub target_table_id: TableId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "empty_attributes")]
    pub attributes: Value,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl Relationship {
    pub fn new(
        id: impl Into<RelationshipId>,
        workspace_id: impl Into<WorkspaceId>,
        domain_id: impl Into<DomainId>,
        source_table_id: impl Into<TableId>,
        target_table_id: impl Into<TableId>,
    ) -> Self {
        Self {
            id: id.into(),
            workspace_id: workspace_id.into(),
            domain_id: domain_id.into(),
            source_table_id: source_table_id.into(),
            target_table_id: target_table_id.into(),
            name: None,
            attributes: empty_attributes(),
            updated_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }
}

/// The in-memory entity graph for one workspace.
///
/// Built by the caller for each `yaml-to-db` sync, or assembled by the loader
/// from the database. Collections keep the order they were given in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceData {
    pub workspace: Workspace,
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub systems: Vec<System>,
}

impl WorkspaceData {
    /// An entity graph with no domains, tables, relationships, or systems.
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            domains: Vec::new(),
            tables: Vec::new(),
            relationships: Vec::new(),
            systems: Vec::new(),
        }
    }

    /// Number of entities below the workspace row.
    pub fn total_entities(&self) -> usize {
        self.domains.len() + self.tables.len() + self.relationships.len() + self.systems.len()
    }

    /// True when the graph has no entities below the workspace row.
    pub fn is_empty(&self) -> bool {
        self.total_entities() == 0
    }

    /// True when the graph carries an entity of `kind` with this id.
    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Workspace => self.workspace.id.as_str() == id,
            EntityKind::Domain => self.domains.iter().any(|e| e.id.as_str() == id),
            EntityKind::Table => self.tables.iter().any(|e| e.id.as_str() == id),
            EntityKind::System => self.systems.iter().any(|e| e.id.as_str() == id),
            EntityKind::Relationship => self.relationships.iter().any(|e| e.id.as_str() == id),
        }
    }
}
