//! Reconciliation of diverged translations.
//!
//! When a save moves one translation's moderation state, the other
//! translations of the entity may be left carrying older content in the
//! latest revision. The forward revision reconciler re-reads the entity and,
//! when some translation is still unpublished, writes a forward revision that
//! carries every language's own latest content and state.

mod forward_revision;

pub use forward_revision::{
    ForwardPlan, ForwardRevisionReconciler, ReconcileOutcome, WORKER_ID, plan_forward_revision,
};
