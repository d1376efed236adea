//! Storage traits for the content translation workflow.
//!
//! This module defines the contracts of the two collaborators the
//! reconciliation pipeline depends on: the revision store and the queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ctw_core::{EntityId, Langcode, NewEntity, Revision, RevisionId, TranslationSnapshot};
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{QueueItem, SaveRequest};

/// The revisioned, multi-language entity store.
///
/// Implementations must be thread-safe (`Send + Sync`) and allocate revision
/// ids from a single increasing sequence.
///
/// # Default revision contract
///
/// A saved revision becomes the entity's default revision iff the
/// translation it is saved through is in a default-bearing moderation state
/// *and* carries the default revision flag. Any other save produces a
/// forward revision and leaves the current default in place.
#[async_trait]
pub trait RevisionStorage: Send + Sync {
    /// Stores a new entity. Its first revision is always the default one and
    /// every translation in it counts as affected.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidRevision` if the entity has no translations.
    async fn create(&self, entity: NewEntity) -> Result<Revision, StorageError>;

    /// Returns the entity's supported languages in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::EntityNotFound` if the entity does not exist.
    async fn translation_languages(&self, entity_id: EntityId)
    -> Result<Vec<Langcode>, StorageError>;

    /// Loads the default revision. Returns `None` if the entity does not exist.
    async fn load_default(&self, entity_id: EntityId) -> Result<Option<Revision>, StorageError>;

    /// Loads the newest revision. Returns `None` if the entity does not exist.
    async fn load_latest(&self, entity_id: EntityId) -> Result<Option<Revision>, StorageError>;

    /// Loads one specific revision.
    async fn load_revision(
        &self,
        entity_id: EntityId,
        revision_id: RevisionId,
    ) -> Result<Option<Revision>, StorageError>;

    /// Returns the newest revision that changed `langcode`.
    async fn latest_affected_revision(
        &self,
        entity_id: EntityId,
        langcode: &Langcode,
    ) -> Result<Option<RevisionId>, StorageError>;

    /// Stores `request` as a new revision of the entity.
    ///
    /// Only the `via` translation is marked as affected by the new revision.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::EntityNotFound` if the entity does not exist.
    /// Returns `StorageError::VersionConflict` if `if_latest` no longer matches.
    /// Returns `StorageError::InvalidRevision` if the translation set does not
    /// match the entity's languages or `via` is not part of it.
    async fn save(&self, entity_id: EntityId, request: SaveRequest)
    -> Result<Revision, StorageError>;

    /// The reader view of one language.
    ///
    /// Looks only at revisions saved through `langcode`, at or before the
    /// default revision, newest first. Returns the first published snapshot,
    /// or `None` if an archived one comes first or none was ever published.
    async fn load_current_translation(
        &self,
        entity_id: EntityId,
        langcode: &Langcode,
    ) -> Result<Option<TranslationSnapshot>, StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<S: RevisionStorage + ?Sized> RevisionStorage for Arc<S> {
    async fn create(&self, entity: NewEntity) -> Result<Revision, StorageError> {
        (**self).create(entity).await
    }

    async fn translation_languages(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<Langcode>, StorageError> {
        (**self).translation_languages(entity_id).await
    }

    async fn load_default(&self, entity_id: EntityId) -> Result<Option<Revision>, StorageError> {
        (**self).load_default(entity_id).await
    }

    async fn load_latest(&self, entity_id: EntityId) -> Result<Option<Revision>, StorageError> {
        (**self).load_latest(entity_id).await
    }

    async fn load_revision(
        &self,
        entity_id: EntityId,
        revision_id: RevisionId,
    ) -> Result<Option<Revision>, StorageError> {
        (**self).load_revision(entity_id, revision_id).await
    }

    async fn latest_affected_revision(
        &self,
        entity_id: EntityId,
        langcode: &Langcode,
    ) -> Result<Option<RevisionId>, StorageError> {
        (**self).latest_affected_revision(entity_id, langcode).await
    }

    async fn save(
        &self,
        entity_id: EntityId,
        request: SaveRequest,
    ) -> Result<Revision, StorageError> {
        (**self).save(entity_id, request).await
    }

    async fn load_current_translation(
        &self,
        entity_id: EntityId,
        langcode: &Langcode,
    ) -> Result<Option<TranslationSnapshot>, StorageError> {
        (**self).load_current_translation(entity_id, langcode).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// A named, lease-based work queue.
///
/// Delivery is at-least-once: an item is removed only by `delete_item`, and a
/// claimed item whose lease ran out becomes claimable again. The queue does
/// not deduplicate payloads.
#[async_trait]
pub trait ReconciliationQueue: Send + Sync {
    /// The logical queue name.
    fn name(&self) -> &str;

    /// Ensures the queue exists. Calling it on an existing queue is a no-op.
    async fn create_queue(&self) -> Result<(), StorageError>;

    /// Appends a task and returns its item id.
    async fn create_item(&self, data: Value) -> Result<u64, StorageError>;

    /// Number of items in the queue, claimed or not.
    async fn number_of_items(&self) -> Result<usize, StorageError>;

    /// Claims the oldest claimable item for `lease` (or [`crate::DEFAULT_LEASE`]).
    ///
    /// Returns `None` when no item is claimable.
    async fn claim_item(&self, lease: Option<Duration>) -> Result<Option<QueueItem>, StorageError>;

    /// Permanently removes a claimed item.
    async fn delete_item(&self, item: &QueueItem) -> Result<(), StorageError>;

    /// Returns a claimed item to the unclaimed pool immediately.
    async fn release_item(&self, item: &QueueItem) -> Result<(), StorageError>;

    /// Removes the queue and all of its items.
    async fn delete_queue(&self) -> Result<(), StorageError>;
}
