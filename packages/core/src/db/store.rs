//! AssetStore - Typed Data Access over the libsql Store
//!
//! All SQL for components, assets, associated records, and the promotion
//! ledger lives here. Methods come in two flavors:
//!
//! - Plain methods open their own busy-timeout connection (reads, seeding,
//!   single-row writes).
//! - `tx_*` methods take an explicit `&libsql::Connection` and are meant to
//!   run between `BEGIN`/`COMMIT` issued by the promotion transaction, so
//!   every statement of a promotion shares one connection.
//!
//! Row conversion is centralized in the `row_to_*` helpers.

use crate::db::{DatabaseError, DatabaseService};
use crate::models::{
    Asset, Component, Document, HistoryEvent, MigratedCounts, PromotionOperation, PromotionOutcome,
    PromotionStatus,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{params, Connection, Row};
use std::sync::Arc;
use uuid::Uuid;

const COMPONENT_COLUMNS: &str = "id, tenant_id, name, parent_component_id, asset_id, code, \
     description, technical_notes, criticality, safety_critical, image_ref, status, \
     created_at, modified_at";

const ASSET_COLUMNS: &str = "id, tenant_id, name, asset_type, code, description, \
     technical_notes, criticality, safety_critical, image_ref, status, category_id, zone_id, \
     derived_from_component_id, origin_asset_id, promoted_at, created_at, modified_at";

const OPERATION_COLUMNS: &str = "token, component_id, tenant_id, actor_id, status, \
     result_asset_id, migrated_components, migrated_documents, migrated_work_orders, \
     migrated_failures, migrated_history_events, result_json, error_message, created_at, \
     completed_at";

/// Typed data access for AssetGrid entities.
pub struct AssetStore {
    db: Arc<DatabaseService>,
}

impl AssetStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Parse a timestamp column - handles RFC3339 (written by this crate)
    /// and SQLite CURRENT_TIMESTAMP format ("YYYY-MM-DD HH:MM:SS").
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }
        Err(DatabaseError::row_decode(format!(
            "Unable to parse timestamp '{}'",
            s
        )))
    }

    fn parse_timestamp_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        s.map(|v| Self::parse_timestamp(&v)).transpose()
    }

    fn row_to_component(row: &Row) -> Result<Component, DatabaseError> {
        let get_err = |field: &str, e: libsql::Error| {
            DatabaseError::row_decode(format!("component.{}: {}", field, e))
        };
        Ok(Component {
            id: row.get(0).map_err(|e| get_err("id", e))?,
            tenant_id: row.get(1).map_err(|e| get_err("tenant_id", e))?,
            name: row.get(2).map_err(|e| get_err("name", e))?,
            parent_component_id: row.get(3).map_err(|e| get_err("parent_component_id", e))?,
            asset_id: row.get(4).map_err(|e| get_err("asset_id", e))?,
            code: row.get(5).map_err(|e| get_err("code", e))?,
            description: row.get(6).map_err(|e| get_err("description", e))?,
            technical_notes: row.get(7).map_err(|e| get_err("technical_notes", e))?,
            criticality: row.get(8).map_err(|e| get_err("criticality", e))?,
            safety_critical: row.get::<i64>(9).map_err(|e| get_err("safety_critical", e))? != 0,
            image_ref: row.get(10).map_err(|e| get_err("image_ref", e))?,
            status: row.get(11).map_err(|e| get_err("status", e))?,
            created_at: Self::parse_timestamp(
                &row.get::<String>(12).map_err(|e| get_err("created_at", e))?,
            )?,
            modified_at: Self::parse_timestamp(
                &row.get::<String>(13)
                    .map_err(|e| get_err("modified_at", e))?,
            )?,
        })
    }

    fn row_to_asset(row: &Row) -> Result<Asset, DatabaseError> {
        let get_err =
            |field: &str, e: libsql::Error| DatabaseError::row_decode(format!("asset.{}: {}", field, e));
        Ok(Asset {
            id: row.get(0).map_err(|e| get_err("id", e))?,
            tenant_id: row.get(1).map_err(|e| get_err("tenant_id", e))?,
            name: row.get(2).map_err(|e| get_err("name", e))?,
            asset_type: row.get(3).map_err(|e| get_err("asset_type", e))?,
            code: row.get(4).map_err(|e| get_err("code", e))?,
            description: row.get(5).map_err(|e| get_err("description", e))?,
            technical_notes: row.get(6).map_err(|e| get_err("technical_notes", e))?,
            criticality: row.get(7).map_err(|e| get_err("criticality", e))?,
            safety_critical: row.get::<i64>(8).map_err(|e| get_err("safety_critical", e))? != 0,
            image_ref: row.get(9).map_err(|e| get_err("image_ref", e))?,
            status: row.get(10).map_err(|e| get_err("status", e))?,
            category_id: row.get(11).map_err(|e| get_err("category_id", e))?,
            zone_id: row.get(12).map_err(|e| get_err("zone_id", e))?,
            derived_from_component_id: row
                .get(13)
                .map_err(|e| get_err("derived_from_component_id", e))?,
            origin_asset_id: row.get(14).map_err(|e| get_err("origin_asset_id", e))?,
            promoted_at: Self::parse_timestamp_opt(
                row.get(15).map_err(|e| get_err("promoted_at", e))?,
            )?,
            created_at: Self::parse_timestamp(
                &row.get::<String>(16).map_err(|e| get_err("created_at", e))?,
            )?,
            modified_at: Self::parse_timestamp(
                &row.get::<String>(17)
                    .map_err(|e| get_err("modified_at", e))?,
            )?,
        })
    }

    fn row_to_operation(row: &Row) -> Result<PromotionOperation, DatabaseError> {
        let get_err = |field: &str, e: libsql::Error| {
            DatabaseError::row_decode(format!("promotion_operation.{}: {}", field, e))
        };
        let status_str: String = row.get(4).map_err(|e| get_err("status", e))?;
        let status = PromotionStatus::parse(&status_str).ok_or_else(|| {
            DatabaseError::row_decode(format!("Unknown promotion status '{}'", status_str))
        })?;
        Ok(PromotionOperation {
            token: row.get(0).map_err(|e| get_err("token", e))?,
            component_id: row.get(1).map_err(|e| get_err("component_id", e))?,
            tenant_id: row.get(2).map_err(|e| get_err("tenant_id", e))?,
            actor_id: row.get(3).map_err(|e| get_err("actor_id", e))?,
            status,
            result_asset_id: row.get(5).map_err(|e| get_err("result_asset_id", e))?,
            counts: MigratedCounts {
                components: row.get(6).map_err(|e| get_err("migrated_components", e))?,
                documents: row.get(7).map_err(|e| get_err("migrated_documents", e))?,
                work_orders: row.get(8).map_err(|e| get_err("migrated_work_orders", e))?,
                failures: row.get(9).map_err(|e| get_err("migrated_failures", e))?,
                history_events: row
                    .get(10)
                    .map_err(|e| get_err("migrated_history_events", e))?,
            },
            result_json: row.get(11).map_err(|e| get_err("result_json", e))?,
            error_message: row.get(12).map_err(|e| get_err("error_message", e))?,
            created_at: Self::parse_timestamp(
                &row.get::<String>(13).map_err(|e| get_err("created_at", e))?,
            )?,
            completed_at: Self::parse_timestamp_opt(
                row.get(14).map_err(|e| get_err("completed_at", e))?,
            )?,
        })
    }

    //
    // COMPONENT / ASSET CRUD
    //

    pub async fn create_component(&self, component: &Component) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO components (id, tenant_id, name, parent_component_id, asset_id, code, \
             description, technical_notes, criticality, safety_critical, image_ref, status, \
             created_at, modified_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                component.id.as_str(),
                component.tenant_id.as_str(),
                component.name.as_str(),
                component.parent_component_id.as_deref(),
                component.asset_id.as_deref(),
                component.code.as_str(),
                component.description.as_deref(),
                component.technical_notes.as_deref(),
                component.criticality,
                component.safety_critical as i64,
                component.image_ref.as_deref(),
                component.status.as_str(),
                component.created_at.to_rfc3339(),
                component.modified_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert component: {}", e)))?;
        Ok(())
    }

    pub async fn create_asset(&self, asset: &Asset) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        Self::tx_insert_asset(&conn, asset).await
    }

    pub async fn get_component(&self, id: &str) -> Result<Option<Component>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        Self::tx_get_component(&conn, id).await
    }

    pub async fn get_asset(&self, id: &str) -> Result<Option<Asset>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM assets WHERE id = ?", ASSET_COLUMNS))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to prepare get_asset: {}", e)))?;
        let mut rows = stmt
            .query([id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to query get_asset: {}", e)))?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_asset(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_assets(&self, tenant_id: &str) -> Result<Vec<Asset>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM assets WHERE tenant_id = ? ORDER BY created_at, id",
                ASSET_COLUMNS
            ))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to prepare list_assets: {}", e)))?;
        let mut rows = stmt.query([tenant_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query list_assets: {}", e))
        })?;
        let mut assets = Vec::new();
        while let Some(row) = rows.next().await? {
            assets.push(Self::row_to_asset(&row)?);
        }
        Ok(assets)
    }

    /// Direct children of a component (one level).
    pub async fn children_of(&self, parent_id: &str) -> Result<Vec<String>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        Self::tx_child_ids(&conn, parent_id).await
    }

    //
    // ASSOCIATED RECORD SEEDING / READS
    //

    pub async fn create_document(&self, doc: &Document) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO documents (id, tenant_id, component_id, asset_id, title, blob_ref, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                doc.id.as_str(),
                doc.tenant_id.as_str(),
                doc.component_id.as_deref(),
                doc.asset_id.as_deref(),
                doc.title.as_str(),
                doc.blob_ref.as_str(),
                doc.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert document: {}", e)))?;
        Ok(())
    }

    pub async fn create_work_order(
        &self,
        wo: &crate::models::WorkOrder,
    ) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO work_orders (id, tenant_id, component_id, asset_id, title, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                wo.id.as_str(),
                wo.tenant_id.as_str(),
                wo.component_id.as_deref(),
                wo.asset_id.as_deref(),
                wo.title.as_str(),
                wo.status.as_str(),
                wo.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert work order: {}", e)))?;
        Ok(())
    }

    pub async fn create_failure_report(
        &self,
        fr: &crate::models::FailureReport,
    ) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO failure_reports (id, tenant_id, component_id, asset_id, summary, severity, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                fr.id.as_str(),
                fr.tenant_id.as_str(),
                fr.component_id.as_deref(),
                fr.asset_id.as_deref(),
                fr.summary.as_str(),
                fr.severity,
                fr.occurred_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to insert failure report: {}", e))
        })?;
        Ok(())
    }

    pub async fn create_history_event(&self, event: &HistoryEvent) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        Self::tx_insert_history_event(&conn, event).await
    }

    async fn count_where(
        conn: &Connection,
        table: &str,
        column: &str,
        id: &str,
    ) -> Result<i64, DatabaseError> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?",
                table, column
            ))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to prepare count: {}", e)))?;
        let mut rows = stmt
            .query([id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to query count: {}", e)))?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| DatabaseError::row_decode("COUNT(*) returned no row".to_string()))?;
        row.get(0)
            .map_err(|e| DatabaseError::row_decode(format!("count: {}", e)))
    }

    /// Per-category counts of records still referencing a component.
    /// (`components` counts children pointing at it as parent.)
    pub async fn component_record_counts(
        &self,
        component_id: &str,
    ) -> Result<MigratedCounts, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        Ok(MigratedCounts {
            components: Self::count_where(&conn, "components", "parent_component_id", component_id)
                .await?,
            documents: Self::count_where(&conn, "documents", "component_id", component_id).await?,
            work_orders: Self::count_where(&conn, "work_orders", "component_id", component_id)
                .await?,
            failures: Self::count_where(&conn, "failure_reports", "component_id", component_id)
                .await?,
            history_events: Self::count_where(&conn, "history_events", "component_id", component_id)
                .await?,
        })
    }

    /// Per-category counts of records (and components) attached to an asset.
    pub async fn asset_record_counts(
        &self,
        asset_id: &str,
    ) -> Result<MigratedCounts, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        Ok(MigratedCounts {
            components: Self::count_where(&conn, "components", "asset_id", asset_id).await?,
            documents: Self::count_where(&conn, "documents", "asset_id", asset_id).await?,
            work_orders: Self::count_where(&conn, "work_orders", "asset_id", asset_id).await?,
            failures: Self::count_where(&conn, "failure_reports", "asset_id", asset_id).await?,
            history_events: Self::count_where(&conn, "history_events", "asset_id", asset_id).await?,
        })
    }

    pub async fn history_events_for_asset(
        &self,
        asset_id: &str,
    ) -> Result<Vec<HistoryEvent>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, tenant_id, component_id, asset_id, event_type, detail, recorded_at
                 FROM history_events WHERE asset_id = ? ORDER BY recorded_at, id",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare history query: {}", e))
            })?;
        let mut rows = stmt.query([asset_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query history events: {}", e))
        })?;
        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            let get_err = |field: &str, e: libsql::Error| {
                DatabaseError::row_decode(format!("history_event.{}: {}", field, e))
            };
            let detail_json: String = row.get(5).map_err(|e| get_err("detail", e))?;
            events.push(HistoryEvent {
                id: row.get(0).map_err(|e| get_err("id", e))?,
                tenant_id: row.get(1).map_err(|e| get_err("tenant_id", e))?,
                component_id: row.get(2).map_err(|e| get_err("component_id", e))?,
                asset_id: row.get(3).map_err(|e| get_err("asset_id", e))?,
                event_type: row.get(4).map_err(|e| get_err("event_type", e))?,
                detail: serde_json::from_str(&detail_json).map_err(|e| {
                    DatabaseError::row_decode(format!("history_event.detail JSON: {}", e))
                })?,
                recorded_at: Self::parse_timestamp(
                    &row.get::<String>(6).map_err(|e| get_err("recorded_at", e))?,
                )?,
            });
        }
        Ok(events)
    }

    pub async fn documents_for_asset(&self, asset_id: &str) -> Result<Vec<Document>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(
                "SELECT id, tenant_id, component_id, asset_id, title, blob_ref, created_at
                 FROM documents WHERE asset_id = ? ORDER BY created_at, id",
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare documents query: {}", e))
            })?;
        let mut rows = stmt.query([asset_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query documents: {}", e))
        })?;
        let mut docs = Vec::new();
        while let Some(row) = rows.next().await? {
            let get_err = |field: &str, e: libsql::Error| {
                DatabaseError::row_decode(format!("document.{}: {}", field, e))
            };
            docs.push(Document {
                id: row.get(0).map_err(|e| get_err("id", e))?,
                tenant_id: row.get(1).map_err(|e| get_err("tenant_id", e))?,
                component_id: row.get(2).map_err(|e| get_err("component_id", e))?,
                asset_id: row.get(3).map_err(|e| get_err("asset_id", e))?,
                title: row.get(4).map_err(|e| get_err("title", e))?,
                blob_ref: row.get(5).map_err(|e| get_err("blob_ref", e))?,
                created_at: Self::parse_timestamp(
                    &row.get::<String>(6).map_err(|e| get_err("created_at", e))?,
                )?,
            });
        }
        Ok(docs)
    }

    //
    // PROMOTION LEDGER (sole writer of promotion_operations)
    //

    /// Insert a PENDING ledger row if the token has never been seen.
    /// Returns true if this call created the row.
    pub async fn insert_operation_if_absent(
        &self,
        token: &str,
        component_id: &str,
        tenant_id: &str,
        actor_id: &str,
    ) -> Result<bool, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let affected = conn
            .execute(
                "INSERT INTO promotion_operations (token, component_id, tenant_id, actor_id, status, created_at)
                 VALUES (?, ?, ?, ?, 'PENDING', ?)
                 ON CONFLICT(token) DO NOTHING",
                params![
                    token,
                    component_id,
                    tenant_id,
                    actor_id,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to insert promotion operation: {}", e))
            })?;
        Ok(affected == 1)
    }

    pub async fn get_operation(
        &self,
        token: &str,
    ) -> Result<Option<PromotionOperation>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM promotion_operations WHERE token = ?",
                OPERATION_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare get_operation: {}", e))
            })?;
        let mut rows = stmt.query([token]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query get_operation: {}", e))
        })?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_operation(&row)?)),
            None => Ok(None),
        }
    }

    /// Re-arm a FAILED ledger row to PENDING for a retry. The status guard
    /// makes exactly one concurrent retrier win. Returns true on success.
    pub async fn rearm_failed_operation(&self, token: &str) -> Result<bool, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let affected = conn
            .execute(
                "UPDATE promotion_operations
                 SET status = 'PENDING', error_message = NULL, completed_at = NULL
                 WHERE token = ? AND status = 'FAILED'",
                [token],
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to re-arm promotion operation: {}", e))
            })?;
        Ok(affected == 1)
    }

    /// Mark PENDING -> COMPLETED on the transaction connection, so the
    /// result snapshot commits atomically with the business mutation.
    /// No-op on already-terminal tokens.
    pub async fn tx_complete_operation(
        conn: &Connection,
        token: &str,
        outcome: &PromotionOutcome,
        result_json: &str,
    ) -> Result<(), DatabaseError> {
        conn.execute(
            "UPDATE promotion_operations
             SET status = 'COMPLETED', result_asset_id = ?, migrated_components = ?,
                 migrated_documents = ?, migrated_work_orders = ?, migrated_failures = ?,
                 migrated_history_events = ?, result_json = ?, completed_at = ?
             WHERE token = ? AND status = 'PENDING'",
            params![
                outcome.asset.id.as_str(),
                outcome.migrated_components,
                outcome.migrated_documents,
                outcome.migrated_work_orders,
                outcome.migrated_failures,
                outcome.migrated_history_events,
                result_json,
                Utc::now().to_rfc3339(),
                token,
            ],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to complete promotion operation: {}", e))
        })?;
        Ok(())
    }

    /// Mark PENDING -> FAILED on a fresh connection, outside the rolled-back
    /// transaction, so the failure record survives. No-op on terminal tokens.
    pub async fn fail_operation(&self, token: &str, error: &str) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "UPDATE promotion_operations
             SET status = 'FAILED', error_message = ?, completed_at = ?
             WHERE token = ? AND status = 'PENDING'",
            params![error, Utc::now().to_rfc3339(), token],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to fail promotion operation: {}", e))
        })?;
        Ok(())
    }

    //
    // TRANSACTIONAL HELPERS (promotion runs these on one connection)
    //

    pub async fn tx_get_component(
        conn: &Connection,
        id: &str,
    ) -> Result<Option<Component>, DatabaseError> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM components WHERE id = ?",
                COMPONENT_COLUMNS
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare get_component: {}", e))
            })?;
        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query get_component: {}", e))
        })?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_component(&row)?)),
            None => Ok(None),
        }
    }

    /// Direct child ids of a component, ordered for deterministic traversal.
    pub async fn tx_child_ids(
        conn: &Connection,
        parent_id: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT id FROM components WHERE parent_component_id = ? ORDER BY id")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare child query: {}", e))
            })?;
        let mut rows = stmt.query([parent_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query children: {}", e))
        })?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(
                row.get(0)
                    .map_err(|e| DatabaseError::row_decode(format!("component.id: {}", e)))?,
            );
        }
        Ok(ids)
    }

    pub async fn tx_asset_exists(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT 1 FROM assets WHERE id = ? LIMIT 1")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare asset probe: {}", e))
            })?;
        let mut rows = stmt
            .query([id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to probe asset: {}", e)))?;
        Ok(rows.next().await?.is_some())
    }

    /// Whether any asset in the tenant already uses this human code.
    pub async fn tx_asset_code_exists(
        conn: &Connection,
        tenant_id: &str,
        code: &str,
    ) -> Result<bool, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT 1 FROM assets WHERE tenant_id = ? AND code = ? LIMIT 1")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare code probe: {}", e))
            })?;
        let mut rows = stmt.query([tenant_id, code]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to probe asset code: {}", e))
        })?;
        Ok(rows.next().await?.is_some())
    }

    pub async fn tx_insert_asset(conn: &Connection, asset: &Asset) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT INTO assets (id, tenant_id, name, asset_type, code, description, \
             technical_notes, criticality, safety_critical, image_ref, status, category_id, \
             zone_id, derived_from_component_id, origin_asset_id, promoted_at, created_at, \
             modified_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                asset.id.as_str(),
                asset.tenant_id.as_str(),
                asset.name.as_str(),
                asset.asset_type.as_str(),
                asset.code.as_str(),
                asset.description.as_deref(),
                asset.technical_notes.as_deref(),
                asset.criticality,
                asset.safety_critical as i64,
                asset.image_ref.as_deref(),
                asset.status.as_str(),
                asset.category_id.as_deref(),
                asset.zone_id.as_deref(),
                asset.derived_from_component_id.as_deref(),
                asset.origin_asset_id.as_deref(),
                asset.promoted_at.map(|t| t.to_rfc3339()),
                asset.created_at.to_rfc3339(),
                asset.modified_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert asset: {}", e)))?;
        Ok(())
    }

    /// Move every record of one category off a component and onto an asset,
    /// clearing the component reference. Used unconditionally for the
    /// promoted root (its row is about to be deleted) and for descendant
    /// work orders / failures / history under the `move` policy.
    pub async fn tx_move_records_to_asset(
        conn: &Connection,
        table: &str,
        component_id: &str,
        asset_id: &str,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            &format!(
                "UPDATE {} SET asset_id = ?, component_id = NULL WHERE component_id = ?",
                table
            ),
            [asset_id, component_id],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to move {} records: {}", table, e))
        })
    }

    /// Rewrite the asset reference of a descendant's documents while keeping
    /// the component reference for per-component granularity.
    pub async fn tx_repoint_documents_to_asset(
        conn: &Connection,
        component_id: &str,
        asset_id: &str,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            "UPDATE documents SET asset_id = ? WHERE component_id = ?",
            [asset_id, component_id],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to repoint documents: {}", e)))
    }

    /// Duplicate a descendant's documents, pointing the copies at the asset
    /// and leaving the originals untouched. Returns the number of copies.
    pub async fn tx_copy_documents_to_asset(
        conn: &Connection,
        component_id: &str,
        asset_id: &str,
    ) -> Result<u64, DatabaseError> {
        let mut stmt = conn
            .prepare("SELECT id FROM documents WHERE component_id = ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare document scan: {}", e))
            })?;
        let mut rows = stmt.query([component_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to scan documents: {}", e))
        })?;
        let mut source_ids: Vec<String> = Vec::new();
        while let Some(row) = rows.next().await? {
            source_ids.push(
                row.get(0)
                    .map_err(|e| DatabaseError::row_decode(format!("document.id: {}", e)))?,
            );
        }

        for source_id in &source_ids {
            conn.execute(
                "INSERT INTO documents (id, tenant_id, component_id, asset_id, title, blob_ref, created_at)
                 SELECT ?, tenant_id, NULL, ?, title, blob_ref, ? FROM documents WHERE id = ?",
                params![
                    Uuid::new_v4().to_string(),
                    asset_id,
                    Utc::now().to_rfc3339(),
                    source_id.as_str(),
                ],
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to copy document: {}", e))
            })?;
        }
        Ok(source_ids.len() as u64)
    }

    /// Reparent a component's direct children onto an asset: they become
    /// tree roots under the new asset. Returns the number reparented.
    pub async fn tx_reparent_direct_children(
        conn: &Connection,
        parent_component_id: &str,
        asset_id: &str,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            "UPDATE components
             SET parent_component_id = NULL, asset_id = ?, modified_at = ?
             WHERE parent_component_id = ?",
            params![asset_id, Utc::now().to_rfc3339(), parent_component_id],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to reparent children: {}", e)))
    }

    /// Reattach the full transitive subtree of a component to an asset,
    /// preserving parent edges among the descendants. A single recursive
    /// query rather than one round trip per level.
    pub async fn tx_reattach_descendants(
        conn: &Connection,
        root_component_id: &str,
        asset_id: &str,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            "UPDATE components SET asset_id = ?1, modified_at = ?3
             WHERE id IN (
                 WITH RECURSIVE subtree(id) AS (
                     SELECT id FROM components WHERE parent_component_id = ?2
                     UNION
                     SELECT c.id FROM components c
                     JOIN subtree s ON c.parent_component_id = s.id
                 )
                 SELECT id FROM subtree
             )",
            params![asset_id, root_component_id, Utc::now().to_rfc3339()],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to reattach descendants: {}", e))
        })
    }

    pub async fn tx_delete_component(conn: &Connection, id: &str) -> Result<u64, DatabaseError> {
        conn.execute("DELETE FROM components WHERE id = ?", [id])
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete component: {}", e)))
    }

    pub async fn tx_insert_history_event(
        conn: &Connection,
        event: &HistoryEvent,
    ) -> Result<(), DatabaseError> {
        let detail_json = serde_json::to_string(&event.detail).map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to serialize event detail: {}", e))
        })?;
        conn.execute(
            "INSERT INTO history_events (id, tenant_id, component_id, asset_id, event_type, detail, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                event.id.as_str(),
                event.tenant_id.as_str(),
                event.component_id.as_deref(),
                event.asset_id.as_deref(),
                event.event_type.as_str(),
                detail_json,
                event.recorded_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to insert history event: {}", e))
        })?;
        Ok(())
    }
}
