//! Conflict policy and the outcome of syncing one file.
//!
//! A conflict exists when a file changed since its last sync and the
//! database row it maps to was also modified outside the engine since then.

use serde::{Deserialize, Serialize};
use std::fmt;

use modelsync_core::{hash_content, EntityKind, SyncResult, WorkspaceData};

/// What to do when both sides changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Apply the file-derived data over the database.
    #[default]
    YamlWins,
    /// Discard the file-derived data and load from the database.
    DbWins,
    /// Report the conflict and apply nothing.
    Prompt,
}

impl ConflictStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::YamlWins => "yaml-wins",
            ConflictStrategy::DbWins => "db-wins",
            ConflictStrategy::Prompt => "prompt",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A semantic file as read from disk, plus the resource it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub file_path: String,
    pub resource_type: EntityKind,
    pub resource_id: String,
    /// Raw file bytes. Text and binary content hash alike.
    pub content: Vec<u8>,
}

impl FileSnapshot {
    pub fn new(
        file_path: impl Into<String>,
        resource_type: EntityKind,
        resource_id: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            resource_type,
            resource_id: resource_id.into(),
            content: content.into(),
        }
    }

    /// Hex digest of the content.
    pub fn content_hash(&self) -> String {
        hash_content(&self.content)
    }
}

/// Both sides changed and the strategy deferred the decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub file_path: String,
    pub resource_type: EntityKind,
    pub resource_id: String,
    /// Hash recorded at the last sync.
    pub stored_hash: String,
    /// Hash of the content now on disk.
    pub incoming_hash: String,
    /// Modification marker of the database row (Unix ms).
    pub db_modified_at: i64,
    /// When the file was last synced (Unix ms).
    pub last_synced_at: i64,
}

/// Explicit decision for a reported conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    KeepFile,
    KeepDatabase,
}

/// What [`SyncEngine::sync_file`](crate::SyncEngine::sync_file) did.
#[derive(Debug, Clone, PartialEq)]
pub enum FileSyncOutcome {
    /// Content matches the last recorded sync. Nothing was written.
    Unchanged,
    /// File-derived data was written to the database.
    Synced(SyncResult),
    /// The file changed but automatic sync is off. Its entry (if any) is now
    /// marked `modified`.
    Pending,
    /// The database side was kept and loaded.
    Loaded {
        data: Option<WorkspaceData>,
        result: SyncResult,
    },
    /// Both sides changed; nothing was applied.
    Conflict(ConflictReport),
}

impl FileSyncOutcome {
    pub fn is_conflict(&self) -> bool {
        matches!(self, FileSyncOutcome::Conflict(_))
    }

    /// The sync report, for outcomes that produced one.
    pub fn result(&self) -> Option<&SyncResult> {
        match self {
            FileSyncOutcome::Synced(result) => Some(result),
            FileSyncOutcome::Loaded { result, .. } => Some(result),
            FileSyncOutcome::Unchanged
            | FileSyncOutcome::Pending
            | FileSyncOutcome::Conflict(_) => None,
        }
    }
}
