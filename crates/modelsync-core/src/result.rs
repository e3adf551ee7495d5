//! The report returned by every sync call.
//!
//! A [`SyncResult`] is created fresh when a call starts, filled in as each
//! entity is processed, and handed back once the call finishes. It is never
//! stored or reused.

use serde::{Deserialize, Serialize};

use crate::entity::EntityKind;
use crate::time::now_millis;

/// Which representation was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncDirection {
    /// Semantic files (already parsed) into the database.
    #[serde(rename = "yaml-to-db")]
    YamlToDb,
    /// Database into an in-memory entity graph.
    #[serde(rename = "db-to-yaml")]
    DbToYaml,
}

/// Outcome counters for one entity collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounters {
    /// Every entity visited, whether or not its save succeeded.
    pub processed: u64,
    /// Saved and not previously present.
    pub added: u64,
    /// Saved over an existing record.
    pub updated: u64,
}

/// Counters per entity collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub domains: EntityCounters,
    pub tables: EntityCounters,
    pub systems: EntityCounters,
    pub relationships: EntityCounters,
}

impl SyncStats {
    /// Counters for the given kind. Workspaces are not counted.
    pub fn counters(&self, kind: EntityKind) -> Option<&EntityCounters> {
        match kind {
            EntityKind::Domain => Some(&self.domains),
            EntityKind::Table => Some(&self.tables),
            EntityKind::System => Some(&self.systems),
            EntityKind::Relationship => Some(&self.relationships),
            EntityKind::Workspace => None,
        }
    }

    pub fn counters_mut(&mut self, kind: EntityKind) -> Option<&mut EntityCounters> {
        match kind {
            EntityKind::Domain => Some(&mut self.domains),
            EntityKind::Table => Some(&mut self.tables),
            EntityKind::System => Some(&mut self.systems),
            EntityKind::Relationship => Some(&mut self.relationships),
            EntityKind::Workspace => None,
        }
    }

    pub fn total_processed(&self) -> u64 {
        self.domains.processed
            + self.tables.processed
            + self.systems.processed
            + self.relationships.processed
    }

    pub fn total_added(&self) -> u64 {
        self.domains.added + self.tables.added + self.systems.added + self.relationships.added
    }

    pub fn total_updated(&self) -> u64 {
        self.domains.updated
            + self.tables.updated
            + self.systems.updated
            + self.relationships.updated
    }

    pub fn tables_processed(&self) -> u64 {
        self.tables.processed
    }

    pub fn tables_added(&self) -> u64 {
        self.tables.added
    }

    pub fn tables_updated(&self) -> u64 {
        self.tables.updated
    }

    pub fn domains_processed(&self) -> u64 {
        self.domains.processed
    }

    pub fn systems_processed(&self) -> u64 {
        self.systems.processed
    }

    pub fn relationships_processed(&self) -> u64 {
        self.relationships.processed
    }
}

/// A failure local to one entity (or, for precondition failures, to the
/// whole call).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityError {
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub message: String,
}

/// Report of a single sync invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub direction: SyncDirection,
    pub stats: SyncStats,
    pub errors: Vec<EntityError>,
    pub warnings: Vec<String>,
    /// Unix ms.
    pub started_at: i64,
    /// Unix ms.
    pub completed_at: i64,
    pub duration_ms: u64,
}

impl SyncResult {
    /// Start a new report, capturing the start time.
    pub fn begin(direction: SyncDirection) -> Self {
        let now = now_millis();
        Self {
            success: false,
            direction,
            stats: SyncStats::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            started_at: now,
            completed_at: now,
            duration_ms: 0,
        }
    }

    /// Record an error for one entity.
    pub fn push_error(
        &mut self,
        entity_type: EntityKind,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors.push(EntityError {
            entity_type,
            entity_id: entity_id.into(),
            message: message.into(),
        });
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Capture the end time and derive `success` from the error list.
    pub fn finish(mut self) -> Self {
        self.completed_at = now_millis().max(self.started_at);
        self.duration_ms = (self.completed_at - self.started_at) as u64;
        self.success = self.errors.is_empty();
        self
    }

    /// Append an error after the report was finished, keeping `success`
    /// consistent with the error list.
    pub fn fail_with(
        &mut self,
        entity_type: EntityKind,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.push_error(entity_type, entity_id, message);
        self.success = false;
    }
}
