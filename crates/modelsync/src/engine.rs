//! The sync engine: one entry point over reconciliation, loading, and
//! per-file bookkeeping.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use modelsync_core::{
    EntityKind, MetadataStats, SyncDirection, SyncMetadataEntry, SyncResult, WorkspaceData,
    WorkspaceId,
};
use modelsync_store::{QueryEngine, SqliteStore, StorageAdapter};
use modelsync_sync::{Loader, Reconciler, SyncMetadataStore};

use crate::config::SyncConfig;
use crate::conflict::{ConflictReport, ConflictStrategy, FileSnapshot, FileSyncOutcome, Resolution};
use crate::error::Result;

/// What the engine is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    Idle,
    Running,
    /// The last sync could not start. Cleared by the next sync that runs.
    Error,
}

impl SyncStatus {
    const fn to_u8(self) -> u8 {
        match self {
            SyncStatus::Idle => 0,
            SyncStatus::Running => 1,
            SyncStatus::Error => 2,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => SyncStatus::Running,
            2 => SyncStatus::Error,
            _ => SyncStatus::Idle,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Running => "running",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds the status at `Running` until dropped, then resets it to `Idle`.
///
/// Dropping covers normal completion, panics, and a cancelled future.
struct RunningGuard<'a> {
    status: &'a AtomicU8,
}

impl<'a> RunningGuard<'a> {
    fn enter(status: &'a AtomicU8) -> Self {
        status.store(SyncStatus::Running.to_u8(), Ordering::SeqCst);
        Self { status }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.status.store(SyncStatus::Idle.to_u8(), Ordering::SeqCst);
    }
}

/// Keeps semantic files and the database consistent.
///
/// The storage adapter must already be initialized by the application; the
/// engine never initializes it.
pub struct SyncEngine<A, Q> {
    adapter: Arc<A>,
    reconciler: Reconciler<A>,
    loader: Loader<A>,
    metadata: SyncMetadataStore<Q>,
    config: SyncConfig,
    status: AtomicU8,
}

impl SyncEngine<SqliteStore, SqliteStore> {
    /// An engine over one SQLite store serving as both adapter and query
    /// engine.
    pub fn sqlite(store: Arc<SqliteStore>, config: SyncConfig) -> Self {
        Self::new(Arc::clone(&store), store, config)
    }
}

impl<A: StorageAdapter, Q: QueryEngine> SyncEngine<A, Q> {
    pub fn new(adapter: Arc<A>, query: Arc<Q>, config: SyncConfig) -> Self {
        Self {
            reconciler: Reconciler::new(Arc::clone(&adapter)).with_debug(config.debug),
            loader: Loader::new(Arc::clone(&adapter)),
            metadata: SyncMetadataStore::new(query),
            adapter,
            config,
            status: AtomicU8::new(SyncStatus::Idle.to_u8()),
        }
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    pub fn metadata(&self) -> &SyncMetadataStore<Q> {
        &self.metadata
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Whole-workspace sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Write `data` into the database.
    ///
    /// If the adapter is not initialized nothing runs: the status becomes
    /// [`SyncStatus::Error`] and the result carries a single workspace error.
    pub async fn sync_from_memory(&self, data: &WorkspaceData) -> SyncResult {
        if !self.adapter.is_initialized() {
            self.status
                .store(SyncStatus::Error.to_u8(), Ordering::SeqCst);
            tracing::warn!(
                workspace = %data.workspace.id,
                "storage adapter not initialized; sync skipped"
            );

            let mut result = SyncResult::begin(SyncDirection::YamlToDb);
            result.push_error(
                EntityKind::Workspace,
                data.workspace.id.as_str(),
                "storage adapter is not initialized",
            );
            return result.finish();
        }

        let _running = RunningGuard::enter(&self.status);
        self.reconciler.reconcile(data).await
    }

    /// Assemble the stored graph for `workspace_id`. `None` if the
    /// workspace does not exist.
    pub async fn load_from_database(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Option<WorkspaceData>> {
        Ok(self.loader.load(workspace_id).await?)
    }

    /// [`load_from_database`](Self::load_from_database) with a `db-to-yaml`
    /// report of what was loaded.
    pub async fn export_from_database(
        &self,
        workspace_id: &WorkspaceId,
    ) -> (Option<WorkspaceData>, SyncResult) {
        self.loader.load_with_result(workspace_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync metadata
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn record_file_sync(
        &self,
        file_path: &str,
        resource_type: EntityKind,
        resource_id: &str,
        content: impl AsRef<[u8]>,
    ) -> Result<()> {
        Ok(self
            .metadata
            .record_file_sync(file_path, resource_type, resource_id, content)
            .await?)
    }

    pub async fn has_file_changed(
        &self,
        file_path: &str,
        content: impl AsRef<[u8]>,
    ) -> Result<bool> {
        Ok(self.metadata.has_file_changed(file_path, content).await?)
    }

    /// Returns `false` when the path has no entry.
    pub async fn mark_file_modified(&self, file_path: &str) -> Result<bool> {
        Ok(self.metadata.mark_file_modified(file_path).await?)
    }

    /// Returns `false` when the path has no entry.
    pub async fn mark_file_error(&self, file_path: &str) -> Result<bool> {
        Ok(self.metadata.mark_file_error(file_path).await?)
    }

    pub async fn get_sync_metadata(&self) -> Result<Vec<SyncMetadataEntry>> {
        Ok(self.metadata.get_sync_metadata().await?)
    }

    pub async fn get_changed_files(&self) -> Result<Vec<SyncMetadataEntry>> {
        Ok(self.metadata.get_changed_files().await?)
    }

    pub async fn get_sync_stats(&self) -> Result<MetadataStats> {
        Ok(self.metadata.get_sync_stats().await?)
    }

    /// Forget every file. The next sync of each file starts from scratch.
    pub async fn clear_sync_metadata(&self) -> Result<u64> {
        Ok(self.metadata.clear_sync_metadata().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Per-file sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Sync one semantic file, applying the configured conflict strategy.
    ///
    /// `data` is the entity graph parsed from the file's workspace. Metadata
    /// failures never abort the call: an unreadable entry counts as changed
    /// and a failed write is reported in the result's errors.
    pub async fn sync_file(
        &self,
        snapshot: &FileSnapshot,
        data: &WorkspaceData,
    ) -> FileSyncOutcome {
        let mut warnings = Vec::new();
        let incoming_hash = snapshot.content_hash();

        let entry = match self.metadata.get_entry(&snapshot.file_path).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(file = %snapshot.file_path, error = %e, "sync metadata unreadable");
                warnings.push(format!(
                    "sync metadata unreadable for {}: {}; treating file as changed",
                    snapshot.file_path, e
                ));
                None
            }
        };

        // Only a `synced` entry with a matching hash is skipped.
        let entry = match entry {
            Some(entry) if entry.file_hash == incoming_hash && entry.is_synced() => {
                tracing::trace!(file = %snapshot.file_path, "file unchanged");
                return FileSyncOutcome::Unchanged;
            }
            other => other,
        };

        let conflict = match &entry {
            Some(entry) => {
                self.detect_conflict(entry, &incoming_hash, &mut warnings)
                    .await
            }
            None => None,
        };

        let Some(report) = conflict else {
            return self.accept_file(snapshot, data, warnings).await;
        };

        tracing::info!(
            file = %report.file_path,
            strategy = %self.config.conflict_strategy,
            "file and database both changed"
        );
        match self.config.conflict_strategy {
            ConflictStrategy::YamlWins => self.yaml_wins(snapshot, data, warnings).await,
            ConflictStrategy::DbWins => self.db_wins(&data.workspace.id, warnings).await,
            ConflictStrategy::Prompt => Self::prompt(report),
        }
    }

    /// Apply a caller's decision for a previously reported conflict.
    pub async fn resolve_conflict(
        &self,
        snapshot: &FileSnapshot,
        data: &WorkspaceData,
        resolution: Resolution,
    ) -> FileSyncOutcome {
        tracing::info!(file = %snapshot.file_path, ?resolution, "resolving conflict");
        match resolution {
            Resolution::KeepFile => self.apply_file(snapshot, data, Vec::new()).await,
            Resolution::KeepDatabase => self.db_wins(&data.workspace.id, Vec::new()).await,
        }
    }

    /// The row is modified externally when its marker moved past the one
    /// stored at the engine's last write. Entries without a stored marker
    /// fall back to `last_synced_at`.
    async fn detect_conflict(
        &self,
        entry: &SyncMetadataEntry,
        incoming_hash: &str,
        warnings: &mut Vec<String>,
    ) -> Option<ConflictReport> {
        let baseline = entry.db_marker.unwrap_or(entry.last_synced_at);
        match self
            .adapter
            .modified_at(entry.resource_type, &entry.resource_id)
            .await
        {
            Ok(Some(db_modified_at)) if db_modified_at > baseline => {
                Some(ConflictReport {
                    file_path: entry.file_path.clone(),
                    resource_type: entry.resource_type,
                    resource_id: entry.resource_id.clone(),
                    stored_hash: entry.file_hash.clone(),
                    incoming_hash: incoming_hash.to_string(),
                    db_modified_at,
                    last_synced_at: entry.last_synced_at,
                })
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(file = %entry.file_path, error = %e, "database marker unreadable");
                warnings.push(format!(
                    "could not check {} {} for database changes: {}",
                    entry.resource_type, entry.resource_id, e
                ));
                None
            }
        }
    }

    /// A changed file with no conflict. Honors `auto_sync`.
    async fn accept_file(
        &self,
        snapshot: &FileSnapshot,
        data: &WorkspaceData,
        warnings: Vec<String>,
    ) -> FileSyncOutcome {
        if self.config.auto_sync {
            self.apply_file(snapshot, data, warnings).await
        } else {
            self.defer_file(snapshot).await
        }
    }

    async fn yaml_wins(
        &self,
        snapshot: &FileSnapshot,
        data: &WorkspaceData,
        warnings: Vec<String>,
    ) -> FileSyncOutcome {
        self.accept_file(snapshot, data, warnings).await
    }

    async fn db_wins(&self, workspace_id: &WorkspaceId, warnings: Vec<String>) -> FileSyncOutcome {
        let (data, mut result) = self.export_from_database(workspace_id).await;
        for warning in warnings {
            result.push_warning(warning);
        }
        FileSyncOutcome::Loaded { data, result }
    }

    fn prompt(report: ConflictReport) -> FileSyncOutcome {
        FileSyncOutcome::Conflict(report)
    }

    async fn apply_file(
        &self,
        snapshot: &FileSnapshot,
        data: &WorkspaceData,
        warnings: Vec<String>,
    ) -> FileSyncOutcome {
        let mut result = self.sync_from_memory(data).await;

        if result.success {
            let recorded = self
                .metadata
                .record_file_sync(
                    &snapshot.file_path,
                    snapshot.resource_type,
                    &snapshot.resource_id,
                    &snapshot.content,
                )
                .await;
            if let Err(e) = recorded {
                tracing::warn!(
                    file = %snapshot.file_path,
                    error = %e,
                    "failed to record file sync"
                );
                result.fail_with(
                    snapshot.resource_type,
                    snapshot.resource_id.as_str(),
                    format!("failed to record sync of {}: {}", snapshot.file_path, e),
                );
            }
        } else if let Err(e) = self.metadata.mark_file_error(&snapshot.file_path).await {
            tracing::warn!(file = %snapshot.file_path, error = %e, "failed to flag file error");
        }

        // Rows saved before a partial failure were still written by the engine.
        if self.adapter.is_initialized() {
            self.refresh_db_markers(data, &mut result).await;
        }

        for warning in warnings {
            result.push_warning(warning);
        }
        FileSyncOutcome::Synced(result)
    }

    /// Every tracked file whose resource is part of `data` takes the row's
    /// current marker as its new baseline.
    async fn refresh_db_markers(&self, data: &WorkspaceData, result: &mut SyncResult) {
        let entries = match self.metadata.get_sync_metadata().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "database markers not refreshed");
                result.push_warning(format!("database markers not refreshed: {}", e));
                return;
            }
        };

        for entry in entries
            .iter()
            .filter(|entry| data.contains(entry.resource_type, &entry.resource_id))
        {
            let marker = match self
                .adapter
                .modified_at(entry.resource_type, &entry.resource_id)
                .await
            {
                Ok(marker) => marker,
                Err(e) => {
                    result.push_warning(format!(
                        "could not read database marker of {} {}: {}",
                        entry.resource_type, entry.resource_id, e
                    ));
                    continue;
                }
            };
            if let Err(e) = self.metadata.set_db_marker(&entry.file_path, marker).await {
                result.push_warning(format!(
                    "could not store database marker for {}: {}",
                    entry.file_path, e
                ));
            }
        }
    }

    async fn defer_file(&self, snapshot: &FileSnapshot) -> FileSyncOutcome {
        if let Err(e) = self.metadata.mark_file_modified(&snapshot.file_path).await {
            tracing::warn!(file = %snapshot.file_path, error = %e, "failed to flag file modified");
        }
        tracing::debug!(file = %snapshot.file_path, "auto sync off; file left pending");
        FileSyncOutcome::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_guard_resets_on_drop() {
        let status = AtomicU8::new(SyncStatus::Error.to_u8());
        {
            let _guard = RunningGuard::enter(&status);
            assert_eq!(SyncStatus::from_u8(status.load(Ordering::SeqCst)), SyncStatus::Running);
        }
        assert_eq!(SyncStatus::from_u8(status.load(Ordering::SeqCst)), SyncStatus::Idle);
    }

    #[test]
    fn test_running_guard_resets_on_panic() {
        let status = AtomicU8::new(SyncStatus::Idle.to_u8());
        let outcome = std::panic::catch_unwind(|| {
            let _guard = RunningGuard::enter(&status);
            panic!("reconcile blew up");
        });
        assert!(outcome.is_err());
        assert_eq!(SyncStatus::from_u8(status.load(Ordering::SeqCst)), SyncStatus::Idle);
    }

    #[test]
    fn test_status_text_form() {
        assert_eq!(SyncStatus::Running.to_string(), "running");
        for status in [SyncStatus::Idle, SyncStatus::Running, SyncStatus::Error] {
            assert_eq!(SyncStatus::from_u8(status.to_u8()), status);
        }
    }
}
