//! Per-file sync bookkeeping.
//!
//! One row per semantic file, keyed by path, recording the content hash as
//! of the last successful sync and the file's current sync status. The
//! table is created on first use; nothing else in the system writes it.

use std::sync::Arc;

use tokio::sync::OnceCell;

use modelsync_core::{
    hash_content, now_millis, EntityKind, FileSyncStatus, MetadataStats, SyncMetadataEntry,
};
use modelsync_store::{QueryEngine, RowRef, SqlValue};

use crate::error::Result;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS sync_metadata (
    file_path TEXT PRIMARY KEY,
    file_hash TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    last_synced_at INTEGER NOT NULL,
    sync_status TEXT NOT NULL,
    db_marker INTEGER
)";

const CREATE_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_sync_metadata_status ON sync_metadata(sync_status)";

const SELECT_COLUMNS: &str =
    "SELECT file_path, file_hash, resource_type, resource_id, last_synced_at, sync_status, db_marker
     FROM sync_metadata";

/// Reads and writes the `sync_metadata` table.
pub struct SyncMetadataStore<Q> {
    engine: Arc<Q>,
    table_ready: OnceCell<()>,
}

impl<Q: QueryEngine> SyncMetadataStore<Q> {
    pub fn new(engine: Arc<Q>) -> Self {
        Self {
            engine,
            table_ready: OnceCell::new(),
        }
    }

    /// The query engine this store writes through.
    pub fn engine(&self) -> &Arc<Q> {
        &self.engine
    }

    async fn ensure_table(&self) -> Result<()> {
        self.table_ready
            .get_or_try_init(|| async {
                self.engine.execute(CREATE_TABLE, &[]).await?;
                self.engine.execute(CREATE_STATUS_INDEX, &[]).await?;
                tracing::trace!("sync_metadata table ready");
                Ok::<_, crate::SyncError>(())
            })
            .await?;
        Ok(())
    }

    /// Record that `file_path` was just synced with `content`.
    ///
    /// Inserts or replaces the entry with the content's hash, status
    /// `synced`, and the current time. The database marker is cleared until
    /// [`set_db_marker`](Self::set_db_marker) stores a new one.
    pub async fn record_file_sync(
        &self,
        file_path: &str,
        resource_type: EntityKind,
        resource_id: &str,
        content: impl AsRef<[u8]>,
    ) -> Result<()> {
        self.ensure_table().await?;

        let file_hash = hash_content(content);
        self.engine
            .execute(
                "INSERT INTO sync_metadata (
                    file_path, file_hash, resource_type, resource_id, last_synced_at, sync_status,
                    db_marker
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)
                 ON CONFLICT(file_path) DO UPDATE SET
                    file_hash = excluded.file_hash,
                    resource_type = excluded.resource_type,
                    resource_id = excluded.resource_id,
                    last_synced_at = excluded.last_synced_at,
                    sync_status = excluded.sync_status,
                    db_marker = NULL",
                &[
                    file_path.into(),
                    file_hash.into(),
                    resource_type.as_str().into(),
                    resource_id.into(),
                    now_millis().into(),
                    FileSyncStatus::Synced.as_str().into(),
                ],
            )
            .await?;

        tracing::trace!(file_path, %resource_type, resource_id, "recorded file sync");
        Ok(())
    }

    /// True when `file_path` has no entry, or its stored hash differs from
    /// the hash of `content`.
    pub async fn has_file_changed(
        &self,
        file_path: &str,
        content: impl AsRef<[u8]>,
    ) -> Result<bool> {
        let changed = match self.get_entry(file_path).await? {
            None => true,
            Some(entry) => entry.file_hash != hash_content(content),
        };
        tracing::trace!(file_path, changed, "checked file hash");
        Ok(changed)
    }

    /// Flag an existing entry as `modified`, keeping its hash.
    ///
    /// Returns `false` (and changes nothing) when the path has no entry.
    pub async fn mark_file_modified(&self, file_path: &str) -> Result<bool> {
        self.set_status(file_path, FileSyncStatus::Modified).await
    }

    /// Flag an existing entry as `error`, keeping its hash.
    ///
    /// Returns `false` (and changes nothing) when the path has no entry.
    pub async fn mark_file_error(&self, file_path: &str) -> Result<bool> {
        self.set_status(file_path, FileSyncStatus::Error).await
    }

    /// Store the resource row's current `updated_at` for an existing entry.
    ///
    /// Returns `false` (and changes nothing) when the path has no entry.
    pub async fn set_db_marker(&self, file_path: &str, marker: Option<i64>) -> Result<bool> {
        self.ensure_table().await?;

        let changed = self
            .engine
            .execute(
                "UPDATE sync_metadata SET db_marker = ?1 WHERE file_path = ?2",
                &[marker.into(), file_path.into()],
            )
            .await?;
        tracing::trace!(file_path, ?marker, "stored database marker");
        Ok(changed > 0)
    }

    async fn set_status(&self, file_path: &str, status: FileSyncStatus) -> Result<bool> {
        self.ensure_table().await?;

        let changed = self
            .engine
            .execute(
                "UPDATE sync_metadata SET sync_status = ?1 WHERE file_path = ?2",
                &[status.as_str().into(), file_path.into()],
            )
            .await?;

        if changed == 0 {
            tracing::debug!(file_path, %status, "no sync metadata for file; status unchanged");
        }
        Ok(changed > 0)
    }

    pub async fn get_entry(&self, file_path: &str) -> Result<Option<SyncMetadataEntry>> {
        self.ensure_table().await?;

        let sql = format!("{} WHERE file_path = ?1", SELECT_COLUMNS);
        let rows = self.engine.query(&sql, &[file_path.into()]).await?;
        rows.first().map(entry_from_row).transpose()
    }

    /// All entries, ordered by path.
    pub async fn get_sync_metadata(&self) -> Result<Vec<SyncMetadataEntry>> {
        self.select_entries("ORDER BY file_path", &[]).await
    }

    /// Entries whose status is not `synced`, ordered by path.
    pub async fn get_changed_files(&self) -> Result<Vec<SyncMetadataEntry>> {
        self.select_entries(
            "WHERE sync_status != ?1 ORDER BY file_path",
            &[FileSyncStatus::Synced.as_str().into()],
        )
        .await
    }

    async fn select_entries(
        &self,
        clause: &str,
        params: &[SqlValue],
    ) -> Result<Vec<SyncMetadataEntry>> {
        self.ensure_table().await?;

        let sql = format!("{} {}", SELECT_COLUMNS, clause);
        let rows = self.engine.query(&sql, params).await?;
        rows.iter().map(entry_from_row).collect()
    }

    pub async fn get_sync_stats(&self) -> Result<MetadataStats> {
        self.ensure_table().await?;

        let rows = self
            .engine
            .query(
                "SELECT
                    COUNT(*) AS total_files,
                    COALESCE(SUM(CASE WHEN sync_status = 'synced' THEN 1 ELSE 0 END), 0) AS synced_files,
                    COALESCE(SUM(CASE WHEN sync_status = 'modified' THEN 1 ELSE 0 END), 0) AS modified_files,
                    COALESCE(SUM(CASE WHEN sync_status = 'error' THEN 1 ELSE 0 END), 0) AS error_files,
                    MAX(last_synced_at) AS last_sync_at
                 FROM sync_metadata",
                &[],
            )
            .await?;

        let Some(row) = rows.first() else {
            return Ok(MetadataStats::default());
        };

        Ok(MetadataStats {
            total_files: count(&row, "total_files")?,
            synced_files: count(&row, "synced_files")?,
            modified_files: count(&row, "modified_files")?,
            error_files: count(&row, "error_files")?,
            last_sync_at: row.opt_integer("last_sync_at")?,
        })
    }

    /// Delete every entry. Returns the number of entries removed.
    pub async fn clear_sync_metadata(&self) -> Result<u64> {
        self.ensure_table().await?;

        let removed = self.engine.execute("DELETE FROM sync_metadata", &[]).await?;
        tracing::debug!(removed, "cleared sync metadata");
        Ok(removed)
    }
}

fn count(row: &RowRef<'_>, column: &str) -> Result<u64> {
    Ok(row.integer(column)?.max(0) as u64)
}

fn entry_from_row(row: RowRef<'_>) -> Result<SyncMetadataEntry> {
    Ok(SyncMetadataEntry {
        file_path: row.text("file_path")?.to_string(),
        file_hash: row.text("file_hash")?.to_string(),
        resource_type: row.text("resource_type")?.parse()?,
        resource_id: row.text("resource_id")?.to_string(),
        last_synced_at: row.integer("last_synced_at")?,
        sync_status: row.text("sync_status")?.parse()?,
        db_marker: row.opt_integer("db_marker")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelsync_store::SqliteStore;

    fn metadata() -> SyncMetadataStore<SqliteStore> {
        SyncMetadataStore::new(Arc::new(SqliteStore::open_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_first_seen_then_unchanged() {
        let store = metadata();
        let content = "name: orders\n";

        assert!(store.has_file_changed("models/orders.yaml", content).await.unwrap());

        store
            .record_file_sync("models/orders.yaml", EntityKind::Table, "orders", content)
            .await
            .unwrap();
        assert!(!store.has_file_changed("models/orders.yaml", content).await.unwrap());
    }

    #[tokio::test]
    async fn test_changed_content_detected() {
        let store = metadata();
        store
            .record_file_sync("a.yaml", EntityKind::Table, "a", "v: 1")
            .await
            .unwrap();
        assert!(store.has_file_changed("a.yaml", "v: 2").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_is_an_upsert() {
        let store = metadata();
        store
            .record_file_sync("a.yaml", EntityKind::Table, "a", "v: 1")
            .await
            .unwrap();
        store.mark_file_modified("a.yaml").await.unwrap();
        store
            .record_file_sync("a.yaml", EntityKind::Domain, "sales", "v: 2")
            .await
            .unwrap();

        let all = store.get_sync_metadata().await.unwrap();
        assert_eq!(all.len(), 1);
        let entry = &all[0];
        assert_eq!(entry.file_hash, hash_content("v: 2"));
        assert_eq!(entry.resource_type, EntityKind::Domain);
        assert_eq!(entry.resource_id, "sales");
        assert!(entry.is_synced());
    }

    #[tokio::test]
    async fn test_mark_modified_keeps_hash() {
        let store = metadata();
        store
            .record_file_sync("a.yaml", EntityKind::Table, "a", "v: 1")
            .await
            .unwrap();

        assert!(store.mark_file_modified("a.yaml").await.unwrap());

        let entry = store.get_entry("a.yaml").await.unwrap().unwrap();
        assert_eq!(entry.sync_status, FileSyncStatus::Modified);
        assert_eq!(entry.file_hash, hash_content("v: 1"));
        assert!(!store.has_file_changed("a.yaml", "v: 1").await.unwrap());

        let changed = store.get_changed_files().await.unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].file_path, "a.yaml");
    }

    #[tokio::test]
    async fn test_byte_content_hashes_like_text() {
        let store = metadata();
        store
            .record_file_sync("a.yaml", EntityKind::Table, "a", b"v: 1".as_slice())
            .await
            .unwrap();

        assert!(!store.has_file_changed("a.yaml", "v: 1").await.unwrap());
        assert!(store.has_file_changed("a.yaml", vec![0xffu8, 0xfe]).await.unwrap());
    }

    #[tokio::test]
    async fn test_db_marker_cleared_by_record() {
        let store = metadata();
        store
            .record_file_sync("a.yaml", EntityKind::Table, "a", "v: 1")
            .await
            .unwrap();
        assert_eq!(store.get_entry("a.yaml").await.unwrap().unwrap().db_marker, None);

        assert!(store.set_db_marker("a.yaml", Some(42)).await.unwrap());
        assert_eq!(store.get_entry("a.yaml").await.unwrap().unwrap().db_marker, Some(42));

        store
            .record_file_sync("a.yaml", EntityKind::Table, "a", "v: 2")
            .await
            .unwrap();
        assert_eq!(store.get_entry("a.yaml").await.unwrap().unwrap().db_marker, None);

        assert!(!store.set_db_marker("ghost.yaml", Some(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_unknown_file_is_noop() {
        let store = metadata();
        assert!(!store.mark_file_modified("ghost.yaml").await.unwrap());
        assert!(!store.mark_file_error("ghost.yaml").await.unwrap());
        assert!(store.get_sync_metadata().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_after_ten_files() {
        let store = metadata();
        for i in 0..10 {
            let path = format!("models/t{}.yaml", i);
            store
                .record_file_sync(&path, EntityKind::Table, &format!("t{}", i), "name: t")
                .await
                .unwrap();
        }
        store.mark_file_modified("models/t3.yaml").await.unwrap();
        store.mark_file_modified("models/t7.yaml").await.unwrap();

        let stats = store.get_sync_stats().await.unwrap();
        assert_eq!(stats.total_files, 10);
        assert_eq!(stats.synced_files, 8);
        assert_eq!(stats.modified_files, 2);
        assert_eq!(stats.error_files, 0);
        assert!(stats.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn test_stats_empty() {
        let store = metadata();
        let stats = store.get_sync_stats().await.unwrap();
        assert_eq!(stats, MetadataStats::default());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = metadata();
        store
            .record_file_sync("a.yaml", EntityKind::Table, "a", "x")
            .await
            .unwrap();
        store
            .record_file_sync("b.yaml", EntityKind::Table, "b", "y")
            .await
            .unwrap();

        assert_eq!(store.clear_sync_metadata().await.unwrap(), 2);
        assert!(store.get_sync_metadata().await.unwrap().is_empty());
        assert!(store.has_file_changed("a.yaml", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_engine() {
        let store = SyncMetadataStore::new(Arc::new(SqliteStore::new_memory()));

        let err = store.has_file_changed("a.yaml", "x").await.unwrap_err();
        assert!(err.is_unavailable());

        // The table is created once the engine comes up.
        use modelsync_store::StorageAdapter;
        store.engine().initialize().await.unwrap();
        assert!(store.has_file_changed("a.yaml", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_status_is_reported() {
        let store = metadata();
        store
            .record_file_sync("a.yaml", EntityKind::Table, "a", "x")
            .await
            .unwrap();
        store
            .engine()
            .execute("UPDATE sync_metadata SET sync_status = 'stale'", &[])
            .await
            .unwrap();

        let err = store.get_entry("a.yaml").await.unwrap_err();
        assert!(matches!(err, crate::SyncError::Core(_)));
    }
}
