//! An application-owned slot holding the one live [`SyncEngine`].

use std::sync::{Arc, PoisonError, RwLock};

use crate::engine::SyncEngine;

/// Holds at most one engine instance.
///
/// The application owns the cell (typically in its state struct, or in a
/// `static` since [`EngineCell::new`] is `const`) and hands out
/// `Arc<SyncEngine>` handles. [`reset`](Self::reset) drops the instance so
/// the next [`get_or_init`](Self::get_or_init) builds a fresh one, for
/// example with a different conflict strategy. Handles taken before a reset
/// keep working against the old instance.
pub struct EngineCell<A, Q> {
    slot: RwLock<Option<Arc<SyncEngine<A, Q>>>>,
}

impl<A, Q> EngineCell<A, Q> {
    pub const fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// The current engine, building it with `init` if the cell is empty.
    pub fn get_or_init(&self, init: impl FnOnce() -> SyncEngine<A, Q>) -> Arc<SyncEngine<A, Q>> {
        if let Some(engine) = self.current() {
            return engine;
        }

        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have filled the slot between the two locks.
        Arc::clone(slot.get_or_insert_with(|| Arc::new(init())))
    }

    /// Replace the current engine. Returns the previous one, if any.
    pub fn install(&self, engine: SyncEngine<A, Q>) -> Option<Arc<SyncEngine<A, Q>>> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(replaced = slot.is_some(), "sync engine installed");
        slot.replace(Arc::new(engine))
    }

    pub fn current(&self) -> Option<Arc<SyncEngine<A, Q>>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drop the current engine. Returns it, if there was one.
    pub fn reset(&self) -> Option<Arc<SyncEngine<A, Q>>> {
        let previous = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::debug!("sync engine reset");
        }
        previous
    }
}

impl<A, Q> Default for EngineCell<A, Q> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConflictStrategy, SyncConfig};
    use modelsync_store::{MemoryStore, SqliteStore};

    type Cell = EngineCell<MemoryStore, SqliteStore>;

    fn engine(strategy: ConflictStrategy) -> SyncEngine<MemoryStore, SqliteStore> {
        SyncEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SqliteStore::new_memory()),
            SyncConfig::default().with_conflict_strategy(strategy),
        )
    }

    #[test]
    fn test_get_or_init_returns_same_instance() {
        let cell = Cell::new();
        let a = cell.get_or_init(|| engine(ConflictStrategy::YamlWins));
        let b = cell.get_or_init(|| engine(ConflictStrategy::Prompt));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.config().conflict_strategy, ConflictStrategy::YamlWins);
    }

    #[test]
    fn test_reset_allows_reconfiguration() {
        let cell = Cell::new();
        let old = cell.get_or_init(|| engine(ConflictStrategy::YamlWins));

        assert!(cell.reset().is_some());
        assert!(!cell.is_initialized());
        assert!(cell.reset().is_none());

        let new = cell.get_or_init(|| engine(ConflictStrategy::Prompt));
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(new.config().conflict_strategy, ConflictStrategy::Prompt);
        // Old handles stay usable.
        assert_eq!(old.config().conflict_strategy, ConflictStrategy::YamlWins);
    }

    #[test]
    fn test_install_replaces() {
        let cell = Cell::default();
        assert!(cell.current().is_none());
        assert!(cell.install(engine(ConflictStrategy::DbWins)).is_none());
        let previous = cell.install(engine(ConflictStrategy::Prompt)).unwrap();
        assert_eq!(previous.config().conflict_strategy, ConflictStrategy::DbWins);
        assert_eq!(
            cell.current().unwrap().config().conflict_strategy,
            ConflictStrategy::Prompt
        );
    }
}
