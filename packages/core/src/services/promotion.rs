//! Promotion Service - Orchestrator and Atomic Transaction
//!
//! The public entry point of the promotion engine. `promote` validates the
//! request, consults the idempotency ledger, serializes on the per-component
//! lock, runs the atomic promotion transaction, and finalizes the ledger
//! entry. Every statement of a promotion runs between explicit
//! `BEGIN IMMEDIATE`/`COMMIT` on a single connection; any error rolls the
//! whole transaction back and leaves zero partial writes.
//!
//! Transaction steps, in order: revalidate the component, resolve the
//! descendant set, compute a collision-safe asset code, create the new
//! asset with lineage, move the root component's own records, rewire the
//! subtree onto the new asset, apply descendant-scope policy actions,
//! delete the original component, and write the audit trail.
//!
//! This is not a sub-second operation for deep trees: large subtrees imply
//! many rows rewritten, and callers should time out generously.

use crate::db::{AssetStore, DatabaseError, DatabaseService};
use crate::models::{
    Asset, CallerContext, HistoryEvent, MigratedCounts, PromotionOutcome, PromotionRequest,
    PromotionResponse, ValidationError,
};
use crate::services::error::PromotionError;
use crate::services::graph::{ConnectionEdges, GraphReader};
use crate::services::ledger::{IdempotencyLedger, LedgerDecision};
use crate::services::lock::LockCoordinator;
use crate::services::planner::{plan_migration, RecordAction};
use chrono::Utc;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

// Regex pattern for component id validation (lowercase hex UUID)
const UUID_PATTERN: &str = r"^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$";

/// Asset type used when the caller supplies no hint.
const DEFAULT_ASSET_TYPE: &str = "equipment";

/// How many numeric suffixes to probe before falling back to a random tail.
const CODE_PROBE_LIMIT: u32 = 25;

/// Validate a component id (UUID format).
pub fn is_valid_component_id(id: &str) -> bool {
    static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
    let uuid_regex = UUID_REGEX.get_or_init(|| Regex::new(UUID_PATTERN).unwrap());
    uuid_regex.is_match(id)
}

/// Public orchestrator for component promotion.
pub struct PromotionService {
    db: Arc<DatabaseService>,
    store: Arc<AssetStore>,
    ledger: IdempotencyLedger,
    locks: LockCoordinator,
    /// Fault injection for rollback-atomicity tests: abort the transaction
    /// after record migration but before the component delete.
    #[cfg(test)]
    pub(crate) abort_before_delete: std::sync::atomic::AtomicBool,
}

impl PromotionService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        let store = Arc::new(AssetStore::new(db.clone()));
        Self {
            ledger: IdempotencyLedger::new(store.clone()),
            locks: LockCoordinator::new(),
            db,
            store,
            #[cfg(test)]
            abort_before_delete: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Override the lock wait bound (contended callers fail with Conflict
    /// after this long).
    pub fn with_lock_timeout(db: Arc<DatabaseService>, wait: Duration) -> Self {
        let store = Arc::new(AssetStore::new(db.clone()));
        Self {
            ledger: IdempotencyLedger::new(store.clone()),
            locks: LockCoordinator::with_timeout(wait),
            db,
            store,
            #[cfg(test)]
            abort_before_delete: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.store
    }

    /// Promote a component into an independent asset.
    ///
    /// Exactly-once semantics: replaying a COMPLETED token returns the
    /// stored result verbatim with `cached = true` and performs zero
    /// mutation; a PENDING token fails with Conflict; a FAILED token is
    /// retried. Concurrent attempts on the same component are serialized by
    /// the per-component lock - only the first can observe the component as
    /// still existing.
    pub async fn promote(
        &self,
        ctx: &CallerContext,
        request: &PromotionRequest,
    ) -> Result<PromotionResponse, PromotionError> {
        Self::validate(request)?;

        match self
            .ledger
            .begin(&request.token, &request.component_id, ctx)
            .await?
        {
            LedgerDecision::AlreadyCompleted(outcome) => {
                info!(
                    token = %request.token,
                    asset_id = %outcome.asset.id,
                    "promotion replayed from ledger"
                );
                Ok(PromotionResponse {
                    outcome,
                    cached: true,
                })
            }
            LedgerDecision::InProgress => Err(PromotionError::conflict(format!(
                "Operation {} is already in progress",
                request.token
            ))),
            LedgerDecision::Proceed => match self.execute(ctx, request).await {
                Ok(outcome) => {
                    info!(
                        token = %request.token,
                        component_id = %request.component_id,
                        asset_id = %outcome.asset.id,
                        migrated_components = outcome.migrated_components,
                        "promotion completed"
                    );
                    Ok(PromotionResponse {
                        outcome,
                        cached: false,
                    })
                }
                Err(err) => {
                    if let Err(ledger_err) = self
                        .ledger
                        .finalize_failure(&request.token, &err.to_string())
                        .await
                    {
                        warn!(
                            token = %request.token,
                            error = %ledger_err,
                            "could not record promotion failure in ledger"
                        );
                    }
                    Err(err)
                }
            },
        }
    }

    fn validate(request: &PromotionRequest) -> Result<(), PromotionError> {
        if request.token.trim().is_empty() {
            return Err(ValidationError::MissingToken.into());
        }
        if !is_valid_component_id(&request.component_id) {
            return Err(ValidationError::InvalidComponentId(request.component_id.clone()).into());
        }
        Ok(())
    }

    /// Run the promotion transaction under the per-component lock. The lock
    /// guard spans BEGIN through COMMIT/ROLLBACK, so two transactions on the
    /// same component can never interleave.
    async fn execute(
        &self,
        ctx: &CallerContext,
        request: &PromotionRequest,
    ) -> Result<PromotionOutcome, PromotionError> {
        let _lock = self.locks.acquire(&request.component_id).await?;

        let conn = self.db.connect_with_timeout().await?;
        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin promotion transaction: {}", e))
        })?;

        let result = async {
            let outcome = self.apply(&conn, ctx, request).await?;
            // COMPLETED must commit atomically with the business mutation.
            self.ledger
                .finalize_success(&conn, &request.token, &outcome)
                .await?;
            Ok::<_, PromotionError>(outcome)
        }
        .await;

        match result {
            Ok(outcome) => {
                conn.execute("COMMIT", ()).await.map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to commit promotion transaction: {}",
                        e
                    ))
                })?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = conn.execute("ROLLBACK", ()).await {
                    warn!(
                        token = %request.token,
                        error = %rollback_err,
                        "rollback of promotion transaction failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// The transaction body. Runs entirely on `conn` between BEGIN/COMMIT;
    /// any error propagates uncaught and aborts the whole unit.
    async fn apply(
        &self,
        conn: &libsql::Connection,
        ctx: &CallerContext,
        request: &PromotionRequest,
    ) -> Result<PromotionOutcome, PromotionError> {
        // Revalidate under the lock: a racing promotion may have deleted the
        // component between the ledger check and here.
        let component = AssetStore::tx_get_component(conn, &request.component_id)
            .await?
            .ok_or_else(|| PromotionError::not_found("Component", &request.component_id))?;
        if component.tenant_id != ctx.tenant_id {
            return Err(PromotionError::forbidden(&component.id));
        }
        let origin_asset_id = component
            .asset_id
            .clone()
            .ok_or_else(|| ValidationError::NoOwningAsset(component.id.clone()))?;
        if !AssetStore::tx_asset_exists(conn, &origin_asset_id).await? {
            return Err(PromotionError::not_found("Asset", &origin_asset_id));
        }

        let edges = ConnectionEdges::new(conn);
        let descendants = GraphReader::descendants_of(&edges, &component.id).await?;
        debug!(
            component_id = %component.id,
            descendant_count = descendants.len(),
            "resolved promotion subtree"
        );

        let plan = plan_migration(request.history_policy, request.document_policy);

        // A cosmetic code collision must never block promotion.
        let code = Self::resolve_code(conn, &component.tenant_id, &component.code).await?;

        let now = Utc::now();
        let name = request
            .new_asset_name
            .clone()
            .unwrap_or_else(|| component.name.clone());
        let asset_type = request
            .asset_type_hint
            .clone()
            .unwrap_or_else(|| DEFAULT_ASSET_TYPE.to_string());
        let mut asset = Asset::promoted_from(&component, name, asset_type, code, now);
        asset.category_id = request.target_category_id.clone();
        asset.zone_id = request.target_zone_id.clone();
        AssetStore::tx_insert_asset(conn, &asset).await?;

        // The root's own records always move: the component row is about to
        // be deleted and nothing may keep referencing it.
        let mut counts = MigratedCounts::default();
        for (table, slot) in [
            ("documents", &mut counts.documents),
            ("work_orders", &mut counts.work_orders),
            ("failure_reports", &mut counts.failures),
            ("history_events", &mut counts.history_events),
        ] {
            *slot += AssetStore::tx_move_records_to_asset(conn, table, &component.id, &asset.id)
                .await? as i64;
        }

        // Reattach the full subtree to the new asset first (the recursive
        // walk needs the parent edges intact), then cut the direct children
        // loose as tree roots under it.
        AssetStore::tx_reattach_descendants(conn, &component.id, &asset.id).await?;
        counts.components =
            AssetStore::tx_reparent_direct_children(conn, &component.id, &asset.id).await? as i64;

        for descendant_id in &descendants {
            match plan.descendants.documents {
                RecordAction::Move => {
                    counts.documents +=
                        AssetStore::tx_repoint_documents_to_asset(conn, descendant_id, &asset.id)
                            .await? as i64;
                }
                RecordAction::Copy => {
                    counts.documents +=
                        AssetStore::tx_copy_documents_to_asset(conn, descendant_id, &asset.id)
                            .await? as i64;
                }
                RecordAction::Keep => {}
            }
            if plan.descendants.work_orders == RecordAction::Move {
                for (table, slot) in [
                    ("work_orders", &mut counts.work_orders),
                    ("failure_reports", &mut counts.failures),
                    ("history_events", &mut counts.history_events),
                ] {
                    *slot +=
                        AssetStore::tx_move_records_to_asset(conn, table, descendant_id, &asset.id)
                            .await? as i64;
                }
            }
        }

        #[cfg(test)]
        if self
            .abort_before_delete
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(PromotionError::Database(DatabaseError::sql_execution(
                "fault injection: aborted before component delete",
            )));
        }

        let deleted = AssetStore::tx_delete_component(conn, &component.id).await?;
        if deleted == 0 {
            return Err(PromotionError::not_found("Component", &component.id));
        }

        let promotion_event = HistoryEvent::for_asset(
            &component.tenant_id,
            &asset.id,
            "promotion",
            json!({
                "derivedFromComponentId": component.id,
                "originAssetId": origin_asset_id,
                "actorId": ctx.actor_id,
                "migratedComponents": counts.components,
                "migratedDocuments": counts.documents,
                "migratedWorkOrders": counts.work_orders,
                "migratedFailures": counts.failures,
                "migratedHistoryEvents": counts.history_events,
            }),
        );
        AssetStore::tx_insert_history_event(conn, &promotion_event).await?;

        if request.keep_history_in_origin {
            let removal_event = HistoryEvent::for_asset(
                &component.tenant_id,
                &origin_asset_id,
                "component_removed",
                json!({
                    "componentId": component.id,
                    "promotedAssetId": asset.id,
                    "actorId": ctx.actor_id,
                }),
            );
            AssetStore::tx_insert_history_event(conn, &removal_event).await?;
        }

        Ok(PromotionOutcome::new(asset, counts))
    }

    /// Find a human code not yet used by any asset in the tenant. Probes
    /// numeric suffixes, then falls back to a random tail.
    async fn resolve_code(
        conn: &libsql::Connection,
        tenant_id: &str,
        base: &str,
    ) -> Result<String, PromotionError> {
        if !AssetStore::tx_asset_code_exists(conn, tenant_id, base).await? {
            return Ok(base.to_string());
        }
        for n in 2..=CODE_PROBE_LIMIT {
            let candidate = format!("{}-{}", base, n);
            if !AssetStore::tx_asset_code_exists(conn, tenant_id, &candidate).await? {
                return Ok(candidate);
            }
        }
        let tail = Uuid::new_v4().simple().to_string();
        Ok(format!("{}-{}", base, &tail[..8]))
    }
}
