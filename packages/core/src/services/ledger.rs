//! Idempotency Ledger - Durable Operation Tokens
//!
//! Explicit three-state machine over the `promotion_operations` table:
//! PENDING while an operation runs, COMPLETED with a stored result snapshot,
//! FAILED with an error message and retry permission. "Already completed",
//! "in progress", and "retryable failure" are distinguished by type, not by
//! field-presence checks.
//!
//! The ledger is the sole writer of `promotion_operations`. Success
//! finalization runs on the promotion transaction's connection so the
//! COMPLETED row commits atomically with the business mutation; failure
//! finalization runs on a fresh connection so the FAILED row survives the
//! rolled-back transaction.

use crate::db::AssetStore;
use crate::models::{CallerContext, PromotionOutcome, PromotionStatus, ValidationError};
use crate::services::error::PromotionError;
use std::sync::Arc;
use tracing::debug;

/// Outcome of the idempotency check for one token.
#[derive(Debug)]
pub enum LedgerDecision {
    /// Token completed earlier: return the stored result, mutate nothing.
    AlreadyCompleted(PromotionOutcome),
    /// Token is PENDING in another request: reject with a conflict, no
    /// queuing, no blocking wait.
    InProgress,
    /// Token is new or FAILED: a PENDING row now exists, proceed.
    Proceed,
}

pub struct IdempotencyLedger {
    store: Arc<AssetStore>,
}

impl IdempotencyLedger {
    pub fn new(store: Arc<AssetStore>) -> Self {
        Self { store }
    }

    /// Consult the ledger for `token` and upsert a PENDING row when the
    /// caller may proceed.
    ///
    /// A token that exists under another tenant is rejected `Forbidden`; a
    /// token reused for a different component is a validation error. Both
    /// guards mutate nothing.
    pub async fn begin(
        &self,
        token: &str,
        component_id: &str,
        ctx: &CallerContext,
    ) -> Result<LedgerDecision, PromotionError> {
        if self
            .store
            .insert_operation_if_absent(token, component_id, &ctx.tenant_id, &ctx.actor_id)
            .await?
        {
            debug!(token, component_id, "ledger: new operation registered");
            return Ok(LedgerDecision::Proceed);
        }

        // Token already known: inspect its state.
        let op = self
            .store
            .get_operation(token)
            .await?
            .ok_or_else(|| PromotionError::not_found("Promotion operation", token))?;

        if op.tenant_id != ctx.tenant_id {
            return Err(PromotionError::forbidden(component_id));
        }
        if op.component_id != component_id {
            return Err(PromotionError::Validation(
                ValidationError::TokenComponentMismatch {
                    token: token.to_string(),
                },
            ));
        }

        match op.status {
            PromotionStatus::Completed => {
                let json = op.result_json.ok_or_else(|| {
                    PromotionError::serialization(format!(
                        "Completed operation {} has no stored result",
                        token
                    ))
                })?;
                let outcome: PromotionOutcome = serde_json::from_str(&json).map_err(|e| {
                    PromotionError::serialization(format!(
                        "Stored result for operation {} is unreadable: {}",
                        token, e
                    ))
                })?;
                debug!(token, "ledger: replaying completed operation");
                Ok(LedgerDecision::AlreadyCompleted(outcome))
            }
            PromotionStatus::Pending => Ok(LedgerDecision::InProgress),
            PromotionStatus::Failed => {
                // Retry permitted: re-arm to PENDING. The guarded update
                // lets exactly one concurrent retrier through; the losers
                // see the row as PENDING again.
                if self.store.rearm_failed_operation(token).await? {
                    debug!(token, "ledger: failed operation re-armed for retry");
                    Ok(LedgerDecision::Proceed)
                } else {
                    Ok(LedgerDecision::InProgress)
                }
            }
        }
    }

    /// Transition PENDING -> COMPLETED with the result snapshot, atomically
    /// with the enclosing transaction. Idempotent on terminal tokens.
    pub async fn finalize_success(
        &self,
        conn: &libsql::Connection,
        token: &str,
        outcome: &PromotionOutcome,
    ) -> Result<(), PromotionError> {
        let result_json = serde_json::to_string(outcome)
            .map_err(|e| PromotionError::serialization(format!("Failed to encode result: {}", e)))?;
        AssetStore::tx_complete_operation(conn, token, outcome, &result_json).await?;
        Ok(())
    }

    /// Transition PENDING -> FAILED outside any transaction. Idempotent on
    /// terminal tokens.
    pub async fn finalize_failure(&self, token: &str, error: &str) -> Result<(), PromotionError> {
        self.store.fail_operation(token, error).await?;
        Ok(())
    }
}
