//! Asset Data Structure
//!
//! An asset is a top-level container: it never has a parent and roots a tree
//! of components. Assets created by promotion carry lineage fields pointing
//! back at the component (and origin asset) they were promoted out of.

use crate::models::Component;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A top-level container entity.
///
/// Attribute fields mirror [`Component`] so a promoted component loses no
/// data. `derived_from_component_id`, `origin_asset_id`, and `promoted_at`
/// are only set on assets created by promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub asset_type: String,
    pub code: String,
    pub description: Option<String>,
    pub technical_notes: Option<String>,
    pub criticality: i64,
    pub safety_critical: bool,
    pub image_ref: Option<String>,
    pub status: String,
    /// Opaque classification tag supplied by the caller at promotion time.
    pub category_id: Option<String>,
    /// Opaque location/zone tag supplied by the caller at promotion time.
    pub zone_id: Option<String>,
    /// Provenance: the component this asset was promoted from.
    pub derived_from_component_id: Option<String>,
    /// Provenance: the asset the component was promoted out of.
    pub origin_asset_id: Option<String>,
    pub promoted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Asset {
    /// Create a new standalone asset with an auto-generated UUID.
    pub fn new(
        tenant_id: impl Into<String>,
        name: impl Into<String>,
        asset_type: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            asset_type: asset_type.into(),
            code: code.into(),
            description: None,
            technical_notes: None,
            criticality: 0,
            safety_critical: false,
            image_ref: None,
            status: "active".to_string(),
            category_id: None,
            zone_id: None,
            derived_from_component_id: None,
            origin_asset_id: None,
            promoted_at: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Create the asset a component is promoted into.
    ///
    /// Copies the component's attributes, records lineage, and stamps
    /// `promoted_at`. The caller supplies the collision-safe `code` (the
    /// component's code may already be taken by another asset in the tenant).
    pub fn promoted_from(
        component: &Component,
        name: impl Into<String>,
        asset_type: impl Into<String>,
        code: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: component.tenant_id.clone(),
            name: name.into(),
            asset_type: asset_type.into(),
            code: code.into(),
            description: component.description.clone(),
            technical_notes: component.technical_notes.clone(),
            criticality: component.criticality,
            safety_critical: component.safety_critical,
            image_ref: component.image_ref.clone(),
            status: component.status.clone(),
            category_id: None,
            zone_id: None,
            derived_from_component_id: Some(component.id.clone()),
            origin_asset_id: component.asset_id.clone(),
            promoted_at: Some(now),
            created_at: now,
            modified_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promoted_from_copies_attributes_and_lineage() {
        let mut c = Component::new("t1", "Motor", "M-7", Some("asset-9".into()), None);
        c.description = Some("drive motor".into());
        c.criticality = 80;
        c.safety_critical = true;

        let now = Utc::now();
        let a = Asset::promoted_from(&c, "Motor", "equipment", "M-7", now);

        assert_eq!(a.tenant_id, "t1");
        assert_eq!(a.description.as_deref(), Some("drive motor"));
        assert_eq!(a.criticality, 80);
        assert!(a.safety_critical);
        assert_eq!(a.derived_from_component_id.as_deref(), Some(c.id.as_str()));
        assert_eq!(a.origin_asset_id.as_deref(), Some("asset-9"));
        assert_eq!(a.promoted_at, Some(now));
    }
}
