//! Associated Operational Records
//!
//! Four record categories attach to components and assets: documents, work
//! orders, failure reports, and history events. Every record carries two
//! nullable references, `component_id` and `asset_id`, of which at least
//! one is always set. Work orders, failure reports, and history events are
//! kept exclusive (one reference or the other) by the promotion engine;
//! documents may carry both, using `asset_id` for container scope and
//! `component_id` for per-component granularity.
//!
//! The invariant the promotion engine preserves: after a component is
//! deleted by promotion, no record of any category references its id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document reference. `blob_ref` is an opaque pointer into document
/// storage; promotion re-points rows, it never moves bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub tenant_id: String,
    pub component_id: Option<String>,
    pub asset_id: Option<String>,
    pub title: String,
    pub blob_ref: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrder {
    pub id: String,
    pub tenant_id: String,
    pub component_id: Option<String>,
    pub asset_id: Option<String>,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub id: String,
    pub tenant_id: String,
    pub component_id: Option<String>,
    pub asset_id: Option<String>,
    pub summary: String,
    pub severity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// An append-only audit/history entry. `detail` is a free-form JSON payload;
/// entries written by the promotion engine use the `event_type` tags
/// `"promotion"` and `"component_removed"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub id: String,
    pub tenant_id: String,
    pub component_id: Option<String>,
    pub asset_id: Option<String>,
    pub event_type: String,
    pub detail: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl Document {
    pub fn for_component(
        tenant_id: impl Into<String>,
        component_id: impl Into<String>,
        title: impl Into<String>,
        blob_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            component_id: Some(component_id.into()),
            asset_id: None,
            title: title.into(),
            blob_ref: blob_ref.into(),
            created_at: Utc::now(),
        }
    }
}

impl WorkOrder {
    pub fn for_component(
        tenant_id: impl Into<String>,
        component_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            component_id: Some(component_id.into()),
            asset_id: None,
            title: title.into(),
            status: "open".to_string(),
            created_at: Utc::now(),
        }
    }
}

impl FailureReport {
    pub fn for_component(
        tenant_id: impl Into<String>,
        component_id: impl Into<String>,
        summary: impl Into<String>,
        severity: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            component_id: Some(component_id.into()),
            asset_id: None,
            summary: summary.into(),
            severity,
            occurred_at: Utc::now(),
        }
    }
}

impl HistoryEvent {
    pub fn for_component(
        tenant_id: impl Into<String>,
        component_id: impl Into<String>,
        event_type: impl Into<String>,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            component_id: Some(component_id.into()),
            asset_id: None,
            event_type: event_type.into(),
            detail,
            recorded_at: Utc::now(),
        }
    }

    pub fn for_asset(
        tenant_id: impl Into<String>,
        asset_id: impl Into<String>,
        event_type: impl Into<String>,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            component_id: None,
            asset_id: Some(asset_id.into()),
            event_type: event_type.into(),
            detail,
            recorded_at: Utc::now(),
        }
    }
}
