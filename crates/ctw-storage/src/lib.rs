//! # ctw-storage
//!
//! Collaborator contracts for the content translation workflow.
//!
//! This crate defines the traits and types the reconciliation pipeline talks to.
//! It does not contain any backends - those are provided by separate crates.
//!
//! ## Overview
//!
//! - [`RevisionStorage`] is the revisioned, multi-language entity store:
//!   loading the latest/default revision, saving a new revision through one
//!   translation, and the reader view of each language's current content.
//! - [`ReconciliationQueue`] is a named, lease-based work queue holding
//!   deferred reconciliation tasks.
//! - [`EnqueuingStorage`] wraps a store and enqueues a
//!   [`ForwardRevisionTask`] whenever a save moves a translation's
//!   moderation state.
//!
//! ## Example
//!
//! ```ignore
//! use ctw_storage::{RevisionStorage, SaveRequest, StorageError};
//!
//! async fn publish(
//!     storage: &dyn RevisionStorage,
//!     entity: EntityId,
//!     langcode: &Langcode,
//! ) -> Result<Revision, StorageError> {
//!     let mut latest = storage
//!         .load_latest(entity)
//!         .await?
//!         .ok_or_else(|| StorageError::entity_not_found(entity))?;
//!     latest
//!         .get_translation_mut(langcode)?
//!         .set_moderation_state(ModerationState::Published);
//!     storage.save(entity, SaveRequest::from_revision(latest, langcode.clone())).await
//! }
//! ```

pub mod enqueuing;
mod error;
mod traits;
mod types;

// Re-export everything from submodules
pub use enqueuing::EnqueuingStorage;
pub use error::{ErrorCategory, StorageError};
pub use traits::{ReconciliationQueue, RevisionStorage};
pub use types::{DEFAULT_LEASE, ForwardRevisionTask, QueueItem, SaveRequest};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared revision store.
pub type DynStorage = std::sync::Arc<dyn RevisionStorage>;

/// Type alias for a shared reconciliation queue.
pub type DynQueue = std::sync::Arc<dyn ReconciliationQueue>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use ctw_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::enqueuing::EnqueuingStorage;
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::{ReconciliationQueue, RevisionStorage};
    pub use crate::types::{DEFAULT_LEASE, ForwardRevisionTask, QueueItem, SaveRequest};
    pub use crate::{DynQueue, DynStorage, StorageResult};
}
