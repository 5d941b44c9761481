//! AssetGrid Core Business Logic Layer
//!
//! This crate provides the core data management and service orchestration for
//! the AssetGrid maintenance-management system. Plants are modeled as assets
//! (top-level containers) holding trees of components; documents, work orders,
//! failure reports, and history events attach to either.
//!
//! The centerpiece is the component-promotion engine: converting a component
//! embedded in an asset tree into an independent first-class asset, relocating
//! its entire subtree and all operationally linked records, atomically and
//! exactly once, under concurrent and retried invocations.
//!
//! # Modules
//!
//! - [`models`] - Data structures (Component, Asset, associated records, promotion types)
//! - [`services`] - Business services (promotion orchestrator, ledger, lock, graph, planner)
//! - [`db`] - Database layer with libsql integration

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use models::*;
pub use services::*;
