//! Migration Planner - Policy to Action Table
//!
//! Translates the caller's per-category policies into a typed action table,
//! keeping all policy branching in one pure, persistence-free place. The
//! promotion transaction only executes actions; it never re-derives policy.
//!
//! Root scope is not policy-driven: the promoted component is deleted, so
//! its own records are always moved to the new asset. Descendant scope
//! follows the caller's policies.

use crate::models::{DocumentPolicy, HistoryPolicy};

/// What the transaction does to one record category in one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAction {
    /// Rewrite the record to reference the new asset.
    Move,
    /// Duplicate the record, pointing the copy at the new asset.
    Copy,
    /// Leave the record untouched.
    Keep,
}

/// Actions for the four record categories within one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeActions {
    pub documents: RecordAction,
    pub work_orders: RecordAction,
    pub failures: RecordAction,
    pub history: RecordAction,
}

/// The full per-scope action table for one promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationPlan {
    /// The promoted component's own records.
    pub root: ScopeActions,
    /// Records of every transitive descendant.
    pub descendants: ScopeActions,
}

/// Compute the action table for the given policies.
pub fn plan_migration(history: HistoryPolicy, documents: DocumentPolicy) -> MigrationPlan {
    let operational = match history {
        HistoryPolicy::Move => RecordAction::Move,
        // Descendants survive (reparented onto the new asset), so lineage is
        // preserved without rewriting their records.
        HistoryPolicy::Keep => RecordAction::Keep,
    };
    let descendant_documents = match documents {
        DocumentPolicy::Move => RecordAction::Move,
        DocumentPolicy::Copy => RecordAction::Copy,
        DocumentPolicy::None => RecordAction::Keep,
    };

    MigrationPlan {
        root: ScopeActions {
            documents: RecordAction::Move,
            work_orders: RecordAction::Move,
            failures: RecordAction::Move,
            history: RecordAction::Move,
        },
        descendants: ScopeActions {
            documents: descendant_documents,
            work_orders: operational,
            failures: operational,
            history: operational,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_scope_always_moves_everything() {
        for history in [HistoryPolicy::Move, HistoryPolicy::Keep] {
            for documents in [DocumentPolicy::Copy, DocumentPolicy::Move, DocumentPolicy::None] {
                let plan = plan_migration(history, documents);
                assert_eq!(plan.root.documents, RecordAction::Move);
                assert_eq!(plan.root.work_orders, RecordAction::Move);
                assert_eq!(plan.root.failures, RecordAction::Move);
                assert_eq!(plan.root.history, RecordAction::Move);
            }
        }
    }

    #[test]
    fn test_history_move_rewrites_descendant_operational_records() {
        let plan = plan_migration(HistoryPolicy::Move, DocumentPolicy::None);
        assert_eq!(plan.descendants.work_orders, RecordAction::Move);
        assert_eq!(plan.descendants.failures, RecordAction::Move);
        assert_eq!(plan.descendants.history, RecordAction::Move);
    }

    #[test]
    fn test_history_keep_leaves_descendant_operational_records() {
        let plan = plan_migration(HistoryPolicy::Keep, DocumentPolicy::Move);
        assert_eq!(plan.descendants.work_orders, RecordAction::Keep);
        assert_eq!(plan.descendants.failures, RecordAction::Keep);
        assert_eq!(plan.descendants.history, RecordAction::Keep);
        // The observed asymmetry: documents may move while operational
        // records stay on the descendant.
        assert_eq!(plan.descendants.documents, RecordAction::Move);
    }

    #[test]
    fn test_document_policies_map_one_to_one() {
        assert_eq!(
            plan_migration(HistoryPolicy::Move, DocumentPolicy::Copy)
                .descendants
                .documents,
            RecordAction::Copy
        );
        assert_eq!(
            plan_migration(HistoryPolicy::Move, DocumentPolicy::Move)
                .descendants
                .documents,
            RecordAction::Move
        );
        assert_eq!(
            plan_migration(HistoryPolicy::Move, DocumentPolicy::None)
                .descendants
                .documents,
            RecordAction::Keep
        );
    }
}
