//! SQLite implementation of the StorageAdapter and QueryEngine traits.
//!
//! This is the embedded database backing a workspace. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking. One connection
//! serves both entity persistence and the sync metadata queries.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, Type, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};

use modelsync_core::{
    now_millis, Domain, DomainId, Relationship, RelationshipId, System, SystemId, Table, TableId,
    Workspace, WorkspaceId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::query::{QueryRows, SqlValue};
use crate::traits::{QueryEngine, StorageAdapter};

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-based store implementation.
///
/// The connection is opened lazily by [`StorageAdapter::initialize`] (or
/// eagerly by [`SqliteStore::open`]). Thread-safe via internal Mutex. All
/// operations use spawn_blocking to avoid blocking the async runtime.
pub struct SqliteStore {
    location: Location,
    /// The SQLite connection; `None` until initialized or after `close`.
    conn: Arc<Mutex<Option<Connection>>>,
    ready: AtomicBool,
}

impl SqliteStore {
    /// Describe a database file without opening it.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_location(Location::File(path.as_ref().to_path_buf()))
    }

    /// Describe an in-memory database without opening it.
    pub fn new_memory() -> Self {
        Self::with_location(Location::Memory)
    }

    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new(path);
        store.connect_blocking()?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let store = Self::new_memory();
        store.connect_blocking()?;
        Ok(store)
    }

    fn with_location(location: Location) -> Self {
        Self {
            location,
            conn: Arc::new(Mutex::new(None)),
            ready: AtomicBool::new(false),
        }
    }

    /// Drop the connection. Every later call fails with
    /// [`StoreError::Unavailable`] until `initialize` runs again.
    ///
    /// An in-memory database loses its contents.
    pub async fn close(&self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            lock(&conn)?.take();
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn connect_blocking(&self) -> Result<()> {
        let mut guard = lock(&self.conn)?;
        if guard.is_none() {
            *guard = Some(connect(&self.location)?);
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Run a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            let conn = guard
                .as_mut()
                .ok_or_else(|| StoreError::Unavailable("sqlite store not initialized".into()))?;
            f(conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn lock(conn: &Mutex<Option<Connection>>) -> Result<MutexGuard<'_, Option<Connection>>> {
    conn.lock()
        .map_err(|e| StoreError::Unavailable(format!("connection mutex poisoned: {}", e)))
}

fn connect(location: &Location) -> Result<Connection> {
    let mut conn = match location {
        Location::File(path) => Connection::open(path)?,
        Location::Memory => Connection::open_in_memory()?,
    };
    migration::migrate(&mut conn)?;
    Ok(conn)
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter and row conversion
// ─────────────────────────────────────────────────────────────────────────────

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(v) => SqlValue::Integer(v),
            ValueRef::Real(v) => SqlValue::Real(v),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

fn attributes_from_row(row: &Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let text: String = row.get("attributes")?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn row_to_workspace(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: row.get::<_, String>("id")?.into(),
        name: row.get("name")?,
        attributes: attributes_from_row(row)?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_domain(row: &Row<'_>) -> rusqlite::Result<Domain> {
    Ok(Domain {
        id: row.get::<_, String>("id")?.into(),
        workspace_id: row.get::<_, String>("workspace_id")?.into(),
        name: row.get("name")?,
        attributes: attributes_from_row(row)?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_table(row: &Row<'_>) -> rusqlite::Result<Table> {
    Ok(Table {
        id: row.get::<_, String>("id")?.into(),
        workspace_id: row.get::<_, String>("workspace_id")?.into(),
        domain_id: row.get::<_, String>("domain_id")?.into(),
        name: row.get("name")?,
        attributes: attributes_from_row(row)?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_system(row: &Row<'_>) -> rusqlite::Result<System> {
    Ok(System {
        id: row.get::<_, String>("id")?.into(),
        workspace_id: row.get::<_, String>("workspace_id")?.into(),
        domain_id: row.get::<_, String>("domain_id")?.into(),
        name: row.get("name")?,
        attributes: attributes_from_row(row)?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_relationship(row: &Row<'_>) -> rusqlite::Result<Relationship> {
    Ok(Relationship {
        id: row.get::<_, String>("id")?.into(),
        workspace_id: row.get::<_, String>("workspace_id")?.into(),
        domain_id: row.get::<_, String>("domain_id")?.into(),
        source_table_id: row.get::<_, String>("source_table_id")?.into(),
        target_table_id: row.get::<_, String>("target_table_id")?.into(),
        name: row.get("name")?,
        attributes: attributes_from_row(row)?,
        updated_at: row.get("updated_at")?,
    })
}

fn query_one<T>(
    conn: &Connection,
    sql: &str,
    id: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Option<T>> {
    conn.query_row(sql, params![id], map)
        .optional()
        .map_err(StoreError::from)
}

fn query_all<T>(
    conn: &Connection,
    sql: &str,
    scope: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let items = stmt
        .query_map(params![scope], map)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

#[async_trait]
impl StorageAdapter for SqliteStore {
    async fn initialize(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let location = self.location.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            if guard.is_none() {
                *guard = Some(connect(&location)?);
            }
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))??;

        self.ready.store(true, Ordering::SeqCst);
        tracing::debug!(location = ?self.location, "sqlite store initialized");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Saves
    // ─────────────────────────────────────────────────────────────────────────

    async fn save_workspace(&self, workspace: &Workspace) -> Result<()> {
        let workspace = workspace.clone();
        let attributes = serde_json::to_string(&workspace.attributes)?;

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO workspaces (id, name, attributes, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    attributes = excluded.attributes,
                    updated_at = excluded.updated_at",
                params![
                    workspace.id.as_str(),
                    workspace.name,
                    attributes,
                    now_millis()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn save_domain(&self, domain: &Domain) -> Result<()> {
        let domain = domain.clone();
        let attributes = serde_json::to_string(&domain.attributes)?;

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO domains (id, workspace_id, name, attributes, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    workspace_id = excluded.workspace_id,
                    name = excluded.name,
                    attributes = excluded.attributes,
                    updated_at = excluded.updated_at",
                params![
                    domain.id.as_str(),
                    domain.workspace_id.as_str(),
                    domain.name,
                    attributes,
                    now_millis()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn save_table(&self, table: &Table) -> Result<()> {
        let table = table.clone();
        let attributes = serde_json::to_string(&table.attributes)?;

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO model_tables (id, workspace_id, domain_id, name, attributes, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    workspace_id = excluded.workspace_id,
                    domain_id = excluded.domain_id,
                    name = excluded.name,
                    attributes = excluded.attributes,
                    updated_at = excluded.updated_at",
                params![
                    table.id.as_str(),
                    table.workspace_id.as_str(),
                    table.domain_id.as_str(),
                    table.name,
                    attributes,
                    now_millis()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn save_system(&self, system: &System) -> Result<()> {
        let system = system.clone();
        let attributes = serde_json::to_string(&system.attributes)?;

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO systems (id, workspace_id, domain_id, name, attributes, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    workspace_id = excluded.workspace_id,
                    domain_id = excluded.domain_id,
                    name = excluded.name,
                    attributes = excluded.attributes,
                    updated_at = excluded.updated_at",
                params![
                    system.id.as_str(),
                    system.workspace_id.as_str(),
                    system.domain_id.as_str(),
                    system.name,
                    attributes,
                    now_millis()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn save_relationship(&self, relationship: &Relationship) -> Result<()> {
        let relationship = relationship.clone();
        let attributes = serde_json::to_string(&relationship.attributes)?;

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO relationships (
                    id, workspace_id, domain_id, source_table_id, target_table_id,
                    name, attributes, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    workspace_id = excluded.workspace_id,
                    domain_id = excluded.domain_id,
                    source_table_id = excluded.source_table_id,
                    target_table_id = excluded.target_table_id,
                    name = excluded.name,
                    attributes = excluded.attributes,
                    updated_at = excluded.updated_at",
                params![
                    relationship.id.as_str(),
                    relationship.workspace_id.as_str(),
                    relationship.domain_id.as_str(),
                    relationship.source_table_id.as_str(),
                    relationship.target_table_id.as_str(),
                    relationship.name,
                    attributes,
                    now_millis()
                ],
            )?;
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups by id
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_workspace_by_id(&self, id: &WorkspaceId) -> Result<Option<Workspace>> {
        let id = id.clone();
        self.run(move |conn| {
            query_one(
                conn,
                "SELECT id, name, attributes, updated_at FROM workspaces WHERE id = ?1",
                id.as_str(),
                row_to_workspace,
            )
        })
        .await
    }

    async fn get_domain_by_id(&self, id: &DomainId) -> Result<Option<Domain>> {
        let id = id.clone();
        self.run(move |conn| {
            query_one(
                conn,
                "SELECT id, workspace_id, name, attributes, updated_at
                 FROM domains WHERE id = ?1",
                id.as_str(),
                row_to_domain,
            )
        })
        .await
    }

    async fn get_table_by_id(&self, id: &TableId) -> Result<Option<Table>> {
        let id = id.clone();
        self.run(move |conn| {
            query_one(
                conn,
                "SELECT id, workspace_id, domain_id, name, attributes, updated_at
                 FROM model_tables WHERE id = ?1",
                id.as_str(),
                row_to_table,
            )
        })
        .await
    }

    async fn get_system_by_id(&self, id: &SystemId) -> Result<Option<System>> {
        let id = id.clone();
        self.run(move |conn| {
            query_one(
                conn,
                "SELECT id, workspace_id, domain_id, name, attributes, updated_at
                 FROM systems WHERE id = ?1",
                id.as_str(),
                row_to_system,
            )
        })
        .await
    }

    async fn get_relationship_by_id(&self, id: &RelationshipId) -> Result<Option<Relationship>> {
        let id = id.clone();
        self.run(move |conn| {
            query_one(
                conn,
                "SELECT id, workspace_id, domain_id, source_table_id, target_table_id,
                        name, attributes, updated_at
                 FROM relationships WHERE id = ?1",
                id.as_str(),
                row_to_relationship,
            )
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scoped queries
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_domains_by_workspace(&self, workspace_id: &WorkspaceId) -> Result<Vec<Domain>> {
        let workspace_id = workspace_id.clone();
        self.run(move |conn| {
            query_all(
                conn,
                "SELECT id, workspace_id, name, attributes, updated_at
                 FROM domains WHERE workspace_id = ?1 ORDER BY rowid",
                workspace_id.as_str(),
                row_to_domain,
            )
        })
        .await
    }

    async fn get_tables_by_workspace(&self, workspace_id: &WorkspaceId) -> Result<Vec<Table>> {
        let workspace_id = workspace_id.clone();
        self.run(move |conn| {
            query_all(
                conn,
                "SELECT id, workspace_id, domain_id, name, attributes, updated_at
                 FROM model_tables WHERE workspace_id = ?1 ORDER BY rowid",
                workspace_id.as_str(),
                row_to_table,
            )
        })
        .await
    }

    async fn get_relationships_by_workspace(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<Relationship>> {
        let workspace_id = workspace_id.clone();
        self.run(move |conn| {
            query_all(
                conn,
                "SELECT id, workspace_id, domain_id, source_table_id, target_table_id,
                        name, attributes, updated_at
                 FROM relationships WHERE workspace_id = ?1 ORDER BY rowid",
                workspace_id.as_str(),
                row_to_relationship,
            )
        })
        .await
    }

    async fn get_systems_by_domain(&self, domain_id: &DomainId) -> Result<Vec<System>> {
        let domain_id = domain_id.clone();
        self.run(move |conn| {
            query_all(
                conn,
                "SELECT id, workspace_id, domain_id, name, attributes, updated_at
                 FROM systems WHERE domain_id = ?1 ORDER BY rowid",
                domain_id.as_str(),
                row_to_system,
            )
        })
        .await
    }
}

#[async_trait]
impl QueryEngine for SqliteStore {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryRows> {
        let sql = sql.to_owned();
        let params = params.to_vec();

        self.run(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let width = columns.len();

            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    (0..width)
                        .map(|i| row.get_ref(i).map(SqlValue::from))
                        .collect::<rusqlite::Result<Vec<_>>>()
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(QueryRows { columns, rows })
        })
        .await
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let sql = sql.to_owned();
        let params = params.to_vec();

        self.run(move |conn| {
            let changed = conn.execute(&sql, params_from_iter(params.iter()))?;
            Ok(changed as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_get_table() {
        let store = SqliteStore::open_memory().unwrap();
        let table = Table::new("t1", "ws", "d1", "orders")
            .with_attributes(json!({"columns": [{"name": "id", "type": "bigint"}]}));

        store.save_table(&table).await.unwrap();

        let stored = store.get_table_by_id(&"t1".into()).await.unwrap().unwrap();
        assert_eq!(stored.name, "orders");
        assert_eq!(stored.domain_id.as_str(), "d1");
        assert_eq!(stored.attributes["columns"][0]["type"], "bigint");
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_upsert_keeps_single_row_and_order() {
        let store = SqliteStore::open_memory().unwrap();
        store.save_table(&Table::new("t2", "ws", "d1", "b")).await.unwrap();
        store.save_table(&Table::new("t1", "ws", "d1", "a")).await.unwrap();
        store
            .save_table(&Table::new("t2", "ws", "d1", "b-renamed"))
            .await
            .unwrap();

        let tables = store.get_tables_by_workspace(&"ws".into()).await.unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["b-renamed", "a"]);
    }

    #[tokio::test]
    async fn test_relationship_name_is_optional() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .save_relationship(&Relationship::new("r1", "ws", "d1", "t1", "t2"))
            .await
            .unwrap();
        store
            .save_relationship(&Relationship::new("r2", "ws", "d1", "t2", "t1").with_name("owns"))
            .await
            .unwrap();

        let rels = store
            .get_relationships_by_workspace(&"ws".into())
            .await
            .unwrap();
        assert_eq!(rels[0].name, None);
        assert_eq!(rels[1].name.as_deref(), Some("owns"));
        assert_eq!(rels[1].source_table_id.as_str(), "t2");
    }

    #[tokio::test]
    async fn test_unknown_ids_are_none() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store
            .get_workspace_by_id(&"missing".into())
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_system_by_id(&"missing".into())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unavailable_before_initialize_and_after_close() {
        let store = SqliteStore::new_memory();
        assert!(!store.is_initialized());
        let err = store
            .save_domain(&Domain::new("d1", "ws", "Sales"))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        let err = store.query("SELECT 1", &[]).await.unwrap_err();
        assert!(err.is_unavailable());

        store.initialize().await.unwrap();
        store.initialize().await.unwrap();
        assert!(store.is_initialized());
        store.save_domain(&Domain::new("d1", "ws", "Sales")).await.unwrap();

        store.close().await.unwrap();
        assert!(!store.is_initialized());
        assert!(store
            .get_domain_by_id(&"d1".into())
            .await
            .unwrap_err()
            .is_unavailable());
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workspace.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .save_workspace(&Workspace::new("ws", "Analytics"))
                .await
                .unwrap();
        }

        let store = SqliteStore::new(&path);
        store.initialize().await.unwrap();
        let ws = store.get_workspace_by_id(&"ws".into()).await.unwrap().unwrap();
        assert_eq!(ws.name, "Analytics");
    }

    #[tokio::test]
    async fn test_query_engine_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .execute("CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER)", &[])
            .await
            .unwrap();

        let changed = store
            .execute(
                "INSERT INTO kv (k, v) VALUES (?1, ?2)",
                &[SqlValue::from("a"), SqlValue::Integer(1)],
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let rows = store
            .query("SELECT k, v, NULL AS nothing FROM kv WHERE k = ?1", &["a".into()])
            .await
            .unwrap();
        assert_eq!(rows.columns, vec!["k", "v", "nothing"]);
        let row = rows.first().unwrap();
        assert_eq!(row.text("k").unwrap(), "a");
        assert_eq!(row.integer("v").unwrap(), 1);
        assert_eq!(row.opt_integer("nothing").unwrap(), None);
    }

    #[tokio::test]
    async fn test_query_error_is_database_error() {
        let store = SqliteStore::open_memory().unwrap();
        let err = store.query("SELECT * FROM no_such_table", &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
