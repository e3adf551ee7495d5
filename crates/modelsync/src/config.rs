//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::conflict::ConflictStrategy;
use crate::error::Result;

/// Configuration for the [`SyncEngine`](crate::SyncEngine).
///
/// Deserializes from `{ "debug", "conflictStrategy", "autoSync" }`; missing
/// keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Log every entity outcome at debug level.
    pub debug: bool,
    /// Policy when a file and its database row both changed.
    #[serde(alias = "conflict_strategy")]
    pub conflict_strategy: ConflictStrategy,
    /// Write changed files immediately. When off, changed files are only
    /// marked `modified`.
    #[serde(alias = "auto_sync")]
    pub auto_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debug: false,
            conflict_strategy: ConflictStrategy::YamlWins,
            auto_sync: true,
        }
    }
}

impl SyncConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }

    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }
}
