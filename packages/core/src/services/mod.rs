//! Business Services
//!
//! The promotion engine and its collaborators:
//!
//! - `PromotionService` - public orchestrator and the atomic promotion transaction
//! - `IdempotencyLedger` - durable operation tokens (PENDING/COMPLETED/FAILED)
//! - `LockCoordinator` - per-component exclusive locks with bounded wait
//! - `GraphReader` - transitive descendant resolution with a cycle guard
//! - `planner` - per-category, per-scope migration action table
//!
//! Services coordinate between the database layer and application logic;
//! everything below `PromotionService` is internal and knows nothing about
//! the caller-facing protocol.

pub mod error;
pub mod graph;
pub mod ledger;
pub mod lock;
pub mod planner;
pub mod promotion;

#[cfg(test)]
mod ledger_test;

pub use error::PromotionError;
pub use graph::{ComponentEdges, GraphReader};
pub use ledger::{IdempotencyLedger, LedgerDecision};
pub use lock::LockCoordinator;
pub use planner::{plan_migration, MigrationPlan, RecordAction, ScopeActions};
pub use promotion::PromotionService;
