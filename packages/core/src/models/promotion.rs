//! Promotion Protocol Types
//!
//! Request/response payloads for the promotion orchestrator, the per-category
//! migration policies, and the idempotency-ledger row. Externally visible
//! types serialize camelCase, matching the rest of the API surface.

use crate::models::Asset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors rejected before any ledger interaction.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing idempotency token: promotion requires a caller-supplied operation token")]
    MissingToken,

    #[error("Invalid component ID format: {0}")]
    InvalidComponentId(String),

    #[error("Token {token} was issued for a different component")]
    TokenComponentMismatch { token: String },

    #[error("Component {0} has no owning asset and cannot be promoted")]
    NoOwningAsset(String),
}

/// Opaque caller identity resolved by the identity layer (out of scope here).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub tenant_id: String,
    pub actor_id: String,
}

impl CallerContext {
    pub fn new(tenant_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            actor_id: actor_id.into(),
        }
    }
}

/// What happens to a descendant's work orders, failure reports, and history
/// events. `Move` rewrites them to reference the new asset; `Keep` leaves
/// them on the (still existing, reparented) descendant component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPolicy {
    Move,
    Keep,
}

/// What happens to a descendant's documents. `Move` rewrites the asset
/// reference while preserving component granularity; `Copy` duplicates each
/// row pointed at the new asset; `None` leaves descendant documents alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentPolicy {
    Copy,
    Move,
    None,
}

/// Caller-supplied promotion parameters.
///
/// `token` is the idempotency token: promotion without one is a validation
/// error, there is no fire-and-forget path. `new_asset_name` and
/// `asset_type_hint` default to the component's name and `"equipment"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRequest {
    pub component_id: String,
    pub token: String,
    #[serde(default)]
    pub new_asset_name: Option<String>,
    #[serde(default)]
    pub asset_type_hint: Option<String>,
    #[serde(default)]
    pub target_category_id: Option<String>,
    #[serde(default)]
    pub target_zone_id: Option<String>,
    pub history_policy: HistoryPolicy,
    pub document_policy: DocumentPolicy,
    /// When true, a companion audit event noting the component's removal is
    /// written on the origin asset, pointing at the new asset.
    #[serde(default)]
    pub keep_history_in_origin: bool,
}

/// Per-category migrated-record counts.
///
/// `components` counts direct children reparented onto the new asset (deeper
/// descendants are reattached but keep their parent edges and are not
/// counted). The remaining counts include both root-scope moves and
/// descendant-scope policy actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratedCounts {
    pub components: i64,
    pub documents: i64,
    pub work_orders: i64,
    pub failures: i64,
    pub history_events: i64,
}

/// The durable result of a completed promotion. This is the snapshot the
/// ledger stores and replays verbatim on duplicate tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionOutcome {
    pub asset: Asset,
    pub migrated_components: i64,
    pub migrated_documents: i64,
    pub migrated_work_orders: i64,
    pub migrated_failures: i64,
    pub migrated_history_events: i64,
}

impl PromotionOutcome {
    pub fn new(asset: Asset, counts: MigratedCounts) -> Self {
        Self {
            asset,
            migrated_components: counts.components,
            migrated_documents: counts.documents,
            migrated_work_orders: counts.work_orders,
            migrated_failures: counts.failures,
            migrated_history_events: counts.history_events,
        }
    }
}

/// Orchestrator response: the outcome plus whether it was served from the
/// ledger (`cached = true`) instead of a fresh transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionResponse {
    #[serde(flatten)]
    pub outcome: PromotionOutcome,
    pub cached: bool,
}

/// Idempotency-ledger entry state machine.
///
/// PENDING on first sight of a token; COMPLETED stores the result snapshot
/// and always short-circuits; FAILED is retryable under the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionStatus {
    Pending,
    Completed,
    Failed,
}

impl PromotionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionStatus::Pending => "PENDING",
            PromotionStatus::Completed => "COMPLETED",
            PromotionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PromotionStatus::Pending),
            "COMPLETED" => Some(PromotionStatus::Completed),
            "FAILED" => Some(PromotionStatus::Failed),
            _ => None,
        }
    }
}

/// A row of the idempotency ledger (`promotion_operations` table).
#[derive(Debug, Clone)]
pub struct PromotionOperation {
    pub token: String,
    pub component_id: String,
    pub tenant_id: String,
    pub actor_id: String,
    pub status: PromotionStatus,
    pub result_asset_id: Option<String>,
    pub counts: MigratedCounts,
    /// Full serialized [`PromotionOutcome`], set on COMPLETED.
    pub result_json: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&HistoryPolicy::Move).unwrap(),
            "\"move\""
        );
        assert_eq!(
            serde_json::to_string(&DocumentPolicy::None).unwrap(),
            "\"none\""
        );
        let p: DocumentPolicy = serde_json::from_str("\"copy\"").unwrap();
        assert_eq!(p, DocumentPolicy::Copy);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: PromotionRequest = serde_json::from_str(
            r#"{
                "componentId": "c-1",
                "token": "op-1",
                "historyPolicy": "keep",
                "documentPolicy": "none"
            }"#,
        )
        .unwrap();
        assert_eq!(req.component_id, "c-1");
        assert!(req.new_asset_name.is_none());
        assert!(!req.keep_history_in_origin);
        assert_eq!(req.history_policy, HistoryPolicy::Keep);
    }

    #[test]
    fn test_response_flattens_outcome() {
        let asset = Asset::new("t", "A", "equipment", "A-1");
        let outcome = PromotionOutcome::new(asset, MigratedCounts::default());
        let resp = PromotionResponse {
            outcome,
            cached: true,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("asset").is_some());
        assert!(json.get("migratedComponents").is_some());
        assert_eq!(json.get("cached").unwrap(), true);
        assert!(json.get("outcome").is_none(), "outcome must be flattened");
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            PromotionStatus::Pending,
            PromotionStatus::Completed,
            PromotionStatus::Failed,
        ] {
            assert_eq!(PromotionStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(PromotionStatus::parse("bogus"), None);
    }
}
