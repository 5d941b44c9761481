//! Component Data Structure
//!
//! A component is a node inside an asset tree. Components form a forest under
//! their owning asset via `parent_component_id` edges: a component with no
//! parent hangs directly off the asset, everything else hangs off another
//! component. The edge graph under any asset is expected to be finite and
//! acyclic; traversal code still carries a visited-set guard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A promotable node inside an asset tree.
///
/// # Fields
///
/// - `id`: Unique identifier (UUID string)
/// - `parent_component_id`: Optional tree edge to a parent component
/// - `asset_id`: Owning asset (None is invalid for promotion: a component
///   must belong to an asset to be promoted out of it)
/// - `code`: Human-facing identifier, unique per tenant only by convention
/// - `criticality`: Operational criticality score (0-100)
/// - `safety_critical`: Whether failure of this component is a safety issue
/// - `image_ref`: Opaque reference into document storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub parent_component_id: Option<String>,
    pub asset_id: Option<String>,
    pub code: String,
    pub description: Option<String>,
    pub technical_notes: Option<String>,
    pub criticality: i64,
    pub safety_critical: bool,
    pub image_ref: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Component {
    /// Create a new component with an auto-generated UUID.
    ///
    /// The component is created `active` with default attribute values;
    /// callers adjust attributes on the returned value before persisting.
    pub fn new(
        tenant_id: impl Into<String>,
        name: impl Into<String>,
        code: impl Into<String>,
        asset_id: Option<String>,
        parent_component_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            parent_component_id,
            asset_id,
            code: code.into(),
            description: None,
            technical_notes: None,
            criticality: 0,
            safety_critical: false,
            image_ref: None,
            status: "active".to_string(),
            created_at: now,
            modified_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_component_defaults() {
        let c = Component::new("tenant-1", "Gearbox", "GB-100", Some("asset-1".into()), None);
        assert_eq!(c.tenant_id, "tenant-1");
        assert_eq!(c.status, "active");
        assert!(c.parent_component_id.is_none());
        assert_eq!(c.asset_id.as_deref(), Some("asset-1"));
        assert!(!c.safety_critical);
        // UUID format: 36 chars with dashes
        assert_eq!(c.id.len(), 36);
    }

    #[test]
    fn test_component_serde_camel_case() {
        let c = Component::new("t", "Pump", "P-1", None, None);
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("parentComponentId").is_some());
        assert!(json.get("assetId").is_some());
        assert!(json.get("safetyCritical").is_some());
        assert!(json.get("parent_component_id").is_none());
    }
}
