//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.
//!
//! The `sync_metadata` table is not part of this schema. It belongs to the
//! sync metadata store, which creates it through the query engine.

use rusqlite::Connection;

use modelsync_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Workspace rows: presence is what makes a workspace loadable
        CREATE TABLE workspaces (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            attributes TEXT NOT NULL,         -- JSON, opaque to the engine
            updated_at INTEGER NOT NULL       -- Unix ms of the last save
        );

        CREATE TABLE domains (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            name TEXT NOT NULL,
            attributes TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Table entities of the model
        CREATE TABLE model_tables (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            domain_id TEXT NOT NULL,          -- not a foreign key: orphans are allowed
            name TEXT NOT NULL,
            attributes TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE systems (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            domain_id TEXT NOT NULL,
            name TEXT NOT NULL,
            attributes TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE relationships (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            domain_id TEXT NOT NULL,
            source_table_id TEXT NOT NULL,
            target_table_id TEXT NOT NULL,
            name TEXT,
            attributes TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX idx_domains_workspace ON domains(workspace_id);
        CREATE INDEX idx_tables_workspace ON model_tables(workspace_id);
        CREATE INDEX idx_tables_domain ON model_tables(domain_id);
        CREATE INDEX idx_systems_domain ON systems(domain_id);
        CREATE INDEX idx_relationships_workspace ON relationships(workspace_id);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for expected in [
            "workspaces",
            "domains",
            "model_tables",
            "systems",
            "relationships",
            "schema_migrations",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {}", expected);
        }
        assert!(!tables.contains(&"sync_metadata".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_migration_rejects_newer_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
