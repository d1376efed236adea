//! EnqueuingStorage - a storage wrapper that schedules reconciliation after saves.
//!
//! This wrapper delegates all operations to an inner storage implementation
//! and, after a save that moved a translation's moderation state or produced
//! a new default revision, appends a [`ForwardRevisionTask`] to the
//! reconciliation queue.
//!
//! # Example
//!
//! ```ignore
//! use ctw_storage::EnqueuingStorage;
//!
//! let storage = EnqueuingStorage::new(memory_storage, queue.clone());
//!
//! // After this, a task for the entity sits in the queue
//! storage.save(entity_id, publish_request).await?;
//! ```

use async_trait::async_trait;
use ctw_core::{
    EntityId, Langcode, ModerationState, NewEntity, Revision, RevisionId, TranslationSnapshot,
};
use tracing::{debug, warn};

use crate::DynQueue;
use crate::error::StorageError;
use crate::traits::{ReconciliationQueue, RevisionStorage};
use crate::types::{ForwardRevisionTask, SaveRequest};

/// A storage wrapper that enqueues reconciliation work after saves.
///
/// Tasks are enqueued **after** the save succeeds, so every task refers to a
/// revision that exists. Duplicate tasks for one entity are expected; the
/// worker is idempotent. Saves that leave the via translation's state
/// unchanged and do not produce a default revision enqueue nothing, which
/// keeps the worker's own forward revisions from rescheduling themselves.
pub struct EnqueuingStorage<S: RevisionStorage> {
    /// The inner storage implementation.
    inner: S,
    /// The reconciliation queue.
    queue: DynQueue,
}

impl<S: RevisionStorage> EnqueuingStorage<S> {
    /// Create a new enqueuing storage wrapper.
    pub fn new(inner: S, queue: DynQueue) -> Self {
        Self { inner, queue }
    }

    /// Get a reference to the inner storage.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a reference to the queue.
    pub fn queue(&self) -> &DynQueue {
        &self.queue
    }

    async fn enqueue(&self, saved: &Revision, via: &Langcode) {
        let task = ForwardRevisionTask::new(saved.entity_id)
            .triggered_by(saved.revision_id, via.clone());
        let payload = match task.to_value() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    entity_id = %saved.entity_id,
                    error = %e,
                    "Failed to encode reconciliation task"
                );
                return;
            }
        };
        match self.queue.create_item(payload).await {
            Ok(item_id) => debug!(
                queue = %self.queue.name(),
                item_id,
                entity_id = %saved.entity_id,
                revision_id = %saved.revision_id,
                langcode = %via,
                "Enqueued forward revision task"
            ),
            Err(e) => warn!(
                queue = %self.queue.name(),
                entity_id = %saved.entity_id,
                error = %e,
                "Failed to enqueue forward revision task"
            ),
        }
    }
}

/// Whether a save moved `via` to a different state or produced a new default.
fn is_moderation_transition(
    previous: Option<ModerationState>,
    saved: &Revision,
    via: &Langcode,
) -> bool {
    let current = saved.translation(via).map(|t| t.moderation_state);
    saved.is_default_revision() || previous != current
}

#[async_trait]
impl<S: RevisionStorage> RevisionStorage for EnqueuingStorage<S> {
    async fn create(&self, entity: NewEntity) -> Result<Revision, StorageError> {
        // The first revision is complete by construction
        self.inner.create(entity).await
    }

    async fn translation_languages(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<Langcode>, StorageError> {
        self.inner.translation_languages(entity_id).await
    }

    async fn load_default(&self, entity_id: EntityId) -> Result<Option<Revision>, StorageError> {
        self.inner.load_default(entity_id).await
    }

    async fn load_latest(&self, entity_id: EntityId) -> Result<Option<Revision>, StorageError> {
        self.inner.load_latest(entity_id).await
    }

    async fn load_revision(
        &self,
        entity_id: EntityId,
        revision_id: RevisionId,
    ) -> Result<Option<Revision>, StorageError> {
        self.inner.load_revision(entity_id, revision_id).await
    }

    async fn latest_affected_revision(
        &self,
        entity_id: EntityId,
        langcode: &Langcode,
    ) -> Result<Option<RevisionId>, StorageError> {
        self.inner.latest_affected_revision(entity_id, langcode).await
    }

    async fn save(
        &self,
        entity_id: EntityId,
        request: SaveRequest,
    ) -> Result<Revision, StorageError> {
        let via = request.via.clone();
        let previous = self
            .inner
            .load_latest(entity_id)
            .await?
            .and_then(|latest| latest.translation(&via).map(|t| t.moderation_state));

        let saved = self.inner.save(entity_id, request).await?;

        if is_moderation_transition(previous, &saved, &via) {
            self.enqueue(&saved, &via).await;
        }

        Ok(saved)
    }

    async fn load_current_translation(
        &self,
        entity_id: EntityId,
        langcode: &Langcode,
    ) -> Result<Option<TranslationSnapshot>, StorageError> {
        self.inner.load_current_translation(entity_id, langcode).await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

impl<S: RevisionStorage> std::fmt::Debug for EnqueuingStorage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnqueuingStorage")
            .field("backend", &self.inner.backend_name())
            .field("queue", &self.queue.name())
            .finish()
    }
}
