//! Integration Tests for the Idempotency Ledger
//!
//! Exercises the PENDING/COMPLETED/FAILED state machine against a real
//! embedded database, including the replay, conflict, and retry paths.

#[cfg(test)]
mod ledger_tests {
    use crate::db::{AssetStore, DatabaseService};
    use crate::models::{
        Asset, CallerContext, MigratedCounts, PromotionOutcome, PromotionStatus,
    };
    use crate::services::error::PromotionError;
    use crate::services::ledger::{IdempotencyLedger, LedgerDecision};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn create_test_ledger() -> (IdempotencyLedger, Arc<AssetStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
        let store = Arc::new(AssetStore::new(db));
        let ledger = IdempotencyLedger::new(store.clone());
        (ledger, store, temp_dir)
    }

    fn ctx() -> CallerContext {
        CallerContext::new("tenant-1", "actor-1")
    }

    fn sample_outcome() -> PromotionOutcome {
        let asset = Asset::new("tenant-1", "Pump Station", "equipment", "PS-1");
        PromotionOutcome::new(
            asset,
            MigratedCounts {
                components: 2,
                documents: 3,
                work_orders: 1,
                failures: 0,
                history_events: 4,
            },
        )
    }

    #[tokio::test]
    async fn test_new_token_proceeds_and_registers_pending() {
        let (ledger, store, _temp) = create_test_ledger().await;

        let decision = ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();
        assert!(matches!(decision, LedgerDecision::Proceed));

        let op = store.get_operation("op-1").await.unwrap().unwrap();
        assert_eq!(op.status, PromotionStatus::Pending);
        assert_eq!(op.component_id, "comp-1");
        assert_eq!(op.tenant_id, "tenant-1");
        assert_eq!(op.actor_id, "actor-1");
        assert!(op.result_asset_id.is_none());
    }

    #[tokio::test]
    async fn test_pending_token_reports_in_progress() {
        let (ledger, _store, _temp) = create_test_ledger().await;

        ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();
        let second = ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();
        assert!(matches!(second, LedgerDecision::InProgress));
    }

    #[tokio::test]
    async fn test_completed_token_replays_stored_outcome() {
        let (ledger, store, _temp) = create_test_ledger().await;

        ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();

        let outcome = sample_outcome();
        let conn = store.database().connect_with_timeout().await.unwrap();
        ledger
            .finalize_success(&conn, "op-1", &outcome)
            .await
            .unwrap();

        let decision = ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();
        match decision {
            LedgerDecision::AlreadyCompleted(replayed) => {
                assert_eq!(replayed, outcome);
            }
            other => panic!("Expected AlreadyCompleted, got {:?}", other),
        }

        let op = store.get_operation("op-1").await.unwrap().unwrap();
        assert_eq!(op.status, PromotionStatus::Completed);
        assert_eq!(op.result_asset_id.as_deref(), Some(outcome.asset.id.as_str()));
        assert_eq!(op.counts.documents, 3);
        assert!(op.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_token_is_retryable() {
        let (ledger, store, _temp) = create_test_ledger().await;

        ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();
        ledger
            .finalize_failure("op-1", "store exploded")
            .await
            .unwrap();

        let op = store.get_operation("op-1").await.unwrap().unwrap();
        assert_eq!(op.status, PromotionStatus::Failed);
        assert_eq!(op.error_message.as_deref(), Some("store exploded"));

        // Retry under the same token re-arms the row to PENDING.
        let retry = ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();
        assert!(matches!(retry, LedgerDecision::Proceed));

        let op = store.get_operation("op-1").await.unwrap().unwrap();
        assert_eq!(op.status, PromotionStatus::Pending);
        assert!(op.error_message.is_none());
    }

    #[tokio::test]
    async fn test_finalize_failure_is_noop_on_completed_token() {
        let (ledger, store, _temp) = create_test_ledger().await;

        ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();
        let outcome = sample_outcome();
        let conn = store.database().connect_with_timeout().await.unwrap();
        ledger
            .finalize_success(&conn, "op-1", &outcome)
            .await
            .unwrap();

        // A retried caller thread finalizing late must not clobber the result.
        ledger.finalize_failure("op-1", "too late").await.unwrap();

        let op = store.get_operation("op-1").await.unwrap().unwrap();
        assert_eq!(op.status, PromotionStatus::Completed);
        assert!(op.error_message.is_none());
        assert!(op.result_json.is_some());
    }

    #[tokio::test]
    async fn test_finalize_success_is_noop_on_failed_token() {
        let (ledger, store, _temp) = create_test_ledger().await;

        ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();
        ledger.finalize_failure("op-1", "boom").await.unwrap();

        let conn = store.database().connect_with_timeout().await.unwrap();
        ledger
            .finalize_success(&conn, "op-1", &sample_outcome())
            .await
            .unwrap();

        let op = store.get_operation("op-1").await.unwrap().unwrap();
        assert_eq!(op.status, PromotionStatus::Failed);
        assert!(op.result_json.is_none());
    }

    #[tokio::test]
    async fn test_cross_tenant_token_is_forbidden() {
        let (ledger, _store, _temp) = create_test_ledger().await;

        ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();

        let other = CallerContext::new("tenant-2", "actor-9");
        let err = ledger.begin("op-1", "comp-1", &other).await.unwrap_err();
        assert!(matches!(err, PromotionError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_token_reuse_for_different_component_rejected() {
        let (ledger, _store, _temp) = create_test_ledger().await;

        ledger.begin("op-1", "comp-1", &ctx()).await.unwrap();
        let err = ledger.begin("op-1", "comp-2", &ctx()).await.unwrap_err();
        assert!(matches!(err, PromotionError::Validation(_)));
    }
}
