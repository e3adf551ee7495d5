//! Sync metadata: what the engine remembers about each semantic file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entity::EntityKind;
use crate::error::CoreError;

/// Per-file synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileSyncStatus {
    /// File content matches what was last written to the database.
    Synced,
    /// An external change was detected but has not been re-synced yet.
    Modified,
    /// The last attempt to sync this file failed.
    Error,
}

impl FileSyncStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FileSyncStatus::Synced => "synced",
            FileSyncStatus::Modified => "modified",
            FileSyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for FileSyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileSyncStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(FileSyncStatus::Synced),
            "modified" => Ok(FileSyncStatus::Modified),
            "error" => Ok(FileSyncStatus::Error),
            other => Err(CoreError::InvalidSyncStatus(other.to_string())),
        }
    }
}

/// One row of the `sync_metadata` table.
///
/// At most one entry exists per `file_path`. `file_hash` is the digest of the
/// file content as of `last_synced_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadataEntry {
    pub file_path: String,
    pub file_hash: String,
    pub resource_type: EntityKind,
    pub resource_id: String,
    /// Unix ms.
    pub last_synced_at: i64,
    pub sync_status: FileSyncStatus,
    /// The resource row's `updated_at` as of the engine's last write.
    #[serde(default)]
    pub db_marker: Option<i64>,
}

impl SyncMetadataEntry {
    pub fn is_synced(&self) -> bool {
        self.sync_status == FileSyncStatus::Synced
    }
}

/// Aggregate view over all metadata entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataStats {
    pub total_files: u64,
    pub synced_files: u64,
    pub modified_files: u64,
    pub error_files: u64,
    /// Most recent `last_synced_at` across all entries.
    pub last_sync_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_form() {
        assert_eq!(FileSyncStatus::Modified.to_string(), "modified");
        assert_eq!("error".parse::<FileSyncStatus>().unwrap(), FileSyncStatus::Error);
        assert!("stale".parse::<FileSyncStatus>().is_err());
    }
}
