//! # ctw-workflow
//!
//! Deferred reconciliation of multi-language, moderated content.
//!
//! Publishing one translation of an entity can leave the latest revision
//! carrying older content for the other translations. Saves made through
//! [`Workflow::storage`] enqueue a reconciliation task whenever a
//! translation's moderation state moves; at the end of each processing
//! cycle, [`Workflow::end_cycle`] drains the queue through the
//! [`ForwardRevisionReconciler`], which writes a forward revision carrying
//! every translation's own latest content and state.
//!
//! ## Example
//!
//! ```ignore
//! use ctw_workflow::{Workflow, config::loader::load_config};
//!
//! let workflow = Workflow::from_config(load_config(None)?).await?;
//! let created = workflow.storage().create(entity).await?;
//! workflow.storage().save(created.entity_id, publish_fr).await?;
//!
//! // Once the cycle's business logic has committed
//! workflow.end_cycle().await;
//! ```

pub mod config;
pub mod cycle;
pub mod drain;
pub mod observability;
pub mod reconcile;
pub mod worker;
mod workflow;

pub use cycle::{CycleTeardown, DRAIN_PRIORITY, TeardownError, TeardownReport, TerminateSubscriber};
pub use drain::{DrainLimits, DrainOutcome, DrainReport, EndOfCycleDrainer};
pub use reconcile::{
    ForwardPlan, ForwardRevisionReconciler, ReconcileOutcome, WORKER_ID, plan_forward_revision,
};
pub use worker::{QueueWorker, WorkerError};
pub use workflow::{Workflow, WorkflowStorage};
