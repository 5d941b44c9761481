//! Database Connection Management
//!
//! Core database connection and schema initialization using libsql for
//! AssetGrid's embedded relational store.
//!
//! # Architecture
//!
//! - **Path-agnostic**: accepts any valid PathBuf
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Foreign keys**: enabled for referential integrity
//! - **Idempotent schema**: `CREATE TABLE IF NOT EXISTS` at startup
//!
//! # Connection Patterns
//!
//! Always use `connect_with_timeout()` in async functions. The busy timeout
//! lets concurrent transactions wait and retry instead of failing immediately
//! with `SQLITE_BUSY`; promotion runs multi-statement transactions from
//! concurrent tasks, so this matters.

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service for managing the libsql connection and schema.
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path.
    ///
    /// Ensures the parent directory exists, opens/creates the database file,
    /// and initializes the schema.
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        let is_new_database = !db_path.exists();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Get a raw connection handle.
    ///
    /// Prefer [`connect_with_timeout`](Self::connect_with_timeout) in async
    /// code; this variant sets no busy timeout.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        Ok(self.db.connect()?)
    }

    /// Get a connection with a 5-second busy timeout set.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        Ok(conn)
    }

    /// Execute a PRAGMA statement.
    ///
    /// PRAGMA statements return rows, so query() must be used instead of
    /// execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare pragma '{}': {}", pragma, e))
        })?;
        stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute pragma '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create all tables and indexes if they do not exist.
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        // Assets: top-level containers, never have a parent. Lineage columns
        // are only set on assets created by promotion.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS assets (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                asset_type TEXT NOT NULL,
                code TEXT NOT NULL,
                description TEXT,
                technical_notes TEXT,
                criticality INTEGER NOT NULL DEFAULT 0,
                safety_critical BOOLEAN NOT NULL DEFAULT FALSE,
                image_ref TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                category_id TEXT,
                zone_id TEXT,
                derived_from_component_id TEXT,
                origin_asset_id TEXT,
                promoted_at TEXT,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create assets table: {}", e))
        })?;

        // Components: tree nodes under an asset. The parent edge is NOT
        // cascading: promotion rewires edges explicitly and a dangling
        // reference should fail the transaction, not silently delete a
        // subtree.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS components (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                parent_component_id TEXT,
                asset_id TEXT,
                code TEXT NOT NULL,
                description TEXT,
                technical_notes TEXT,
                criticality INTEGER NOT NULL DEFAULT 0,
                safety_critical BOOLEAN NOT NULL DEFAULT FALSE,
                image_ref TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                FOREIGN KEY (parent_component_id) REFERENCES components(id),
                FOREIGN KEY (asset_id) REFERENCES assets(id)
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create components table: {}", e))
        })?;

        // Associated records. Every row references a component, an asset, or
        // both (documents keep component granularity after a move); never
        // neither.
        for (table, payload_columns) in [
            (
                "documents",
                "title TEXT NOT NULL,
                 blob_ref TEXT NOT NULL,
                 created_at TEXT NOT NULL",
            ),
            (
                "work_orders",
                "title TEXT NOT NULL,
                 status TEXT NOT NULL DEFAULT 'open',
                 created_at TEXT NOT NULL",
            ),
            (
                "failure_reports",
                "summary TEXT NOT NULL,
                 severity INTEGER NOT NULL DEFAULT 0,
                 occurred_at TEXT NOT NULL",
            ),
            (
                "history_events",
                "event_type TEXT NOT NULL,
                 detail JSON NOT NULL DEFAULT '{}',
                 recorded_at TEXT NOT NULL",
            ),
        ] {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        id TEXT PRIMARY KEY,
                        tenant_id TEXT NOT NULL,
                        component_id TEXT,
                        asset_id TEXT,
                        {payload_columns},
                        FOREIGN KEY (component_id) REFERENCES components(id),
                        FOREIGN KEY (asset_id) REFERENCES assets(id),
                        CHECK (component_id IS NOT NULL OR asset_id IS NOT NULL)
                    )"
                ),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to create {} table: {}", table, e))
            })?;
        }

        // Idempotency ledger. component_id carries NO foreign key: a
        // completed promotion deletes the component while its ledger row
        // must survive.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS promotion_operations (
                token TEXT PRIMARY KEY,
                component_id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                result_asset_id TEXT,
                migrated_components INTEGER NOT NULL DEFAULT 0,
                migrated_documents INTEGER NOT NULL DEFAULT 0,
                migrated_work_orders INTEGER NOT NULL DEFAULT 0,
                migrated_failures INTEGER NOT NULL DEFAULT 0,
                migrated_history_events INTEGER NOT NULL DEFAULT 0,
                result_json TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create promotion_operations table: {}",
                e
            ))
        })?;

        self.create_core_indexes(&conn).await?;

        // Flush WAL for newly created databases so rapid open/close cycles
        // in tests never observe a half-initialized schema.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create core indexes.
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        let indexes = [
            // Hierarchy queries (graph traversal)
            "CREATE INDEX IF NOT EXISTS idx_components_parent ON components(parent_component_id)",
            // Bulk fetch by owning asset
            "CREATE INDEX IF NOT EXISTS idx_components_asset ON components(asset_id)",
            // Collision probing for human codes
            "CREATE INDEX IF NOT EXISTS idx_assets_tenant_code ON assets(tenant_id, code)",
            "CREATE INDEX IF NOT EXISTS idx_documents_component ON documents(component_id)",
            "CREATE INDEX IF NOT EXISTS idx_documents_asset ON documents(asset_id)",
            "CREATE INDEX IF NOT EXISTS idx_work_orders_component ON work_orders(component_id)",
            "CREATE INDEX IF NOT EXISTS idx_work_orders_asset ON work_orders(asset_id)",
            "CREATE INDEX IF NOT EXISTS idx_failure_reports_component ON failure_reports(component_id)",
            "CREATE INDEX IF NOT EXISTS idx_failure_reports_asset ON failure_reports(asset_id)",
            "CREATE INDEX IF NOT EXISTS idx_history_events_component ON history_events(component_id)",
            "CREATE INDEX IF NOT EXISTS idx_history_events_asset ON history_events(asset_id)",
        ];

        for sql in indexes {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to create index: {}", e))
            })?;
        }

        Ok(())
    }
}
