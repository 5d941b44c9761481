//! Service Layer Error Types
//!
//! The promotion error taxonomy. Every caller of the orchestrator receives a
//! cached success, a fresh success, or exactly one of these - never a silent
//! partial result.

use crate::db::DatabaseError;
use crate::models::ValidationError;
use thiserror::Error;

/// Promotion operation errors
///
/// Variants map one-to-one onto caller-visible status signals: bad input,
/// not found, forbidden (cross-tenant), conflict (in-progress token or lock
/// contention, retryable), and internal persistence failure.
#[derive(Error, Debug)]
pub enum PromotionError {
    /// Rejected before any ledger interaction
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Component or asset missing (or already promoted by a racing request)
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Component belongs to a different tenant
    #[error("Access denied to component {component_id}")]
    Forbidden { component_id: String },

    /// Operation token currently PENDING, or lock contention; retryable
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    /// Unexpected store failure; transaction rolled back, retryable
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// Result snapshot could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PromotionError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    pub fn forbidden(component_id: impl Into<String>) -> Self {
        Self::Forbidden {
            component_id: component_id.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Whether a caller may retry the same token later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PromotionError::Conflict { .. } | PromotionError::Database(_)
        )
    }
}
