//! Storage and queue types shared by backends and the reconciliation pipeline.

use std::time::Duration;

use ctw_core::{CoreError, EntityId, Langcode, Revision, RevisionId, TranslationSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::StorageError;

/// Lease applied by [`crate::ReconciliationQueue::claim_item`] when the caller
/// passes `None`.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);

/// A request to store a new revision of an existing entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    /// Every translation of the new revision, in enumeration order.
    pub translations: Vec<TranslationSnapshot>,
    /// The translation context the save runs through.
    pub via: Langcode,
    /// Optimistic concurrency check against the entity's latest revision.
    pub if_latest: Option<RevisionId>,
}

impl SaveRequest {
    /// Creates a new `SaveRequest`.
    #[must_use]
    pub fn new(translations: Vec<TranslationSnapshot>, via: Langcode) -> Self {
        Self {
            translations,
            via,
            if_latest: None,
        }
    }

    /// Builds a save of a loaded (and possibly edited) revision as a new
    /// revision, running through `via`.
    #[must_use]
    pub fn from_revision(revision: Revision, via: Langcode) -> Self {
        Self::new(revision.into_translations(), via)
    }

    /// Only store the revision if `revision_id` is still the latest one.
    #[must_use]
    pub fn if_latest(mut self, revision_id: RevisionId) -> Self {
        self.if_latest = Some(revision_id);
        self
    }

    /// Returns the snapshot of the translation the save runs through.
    #[must_use]
    pub fn via_translation(&self) -> Option<&TranslationSnapshot> {
        self.translations.iter().find(|t| t.langcode == self.via)
    }
}

/// A claimed or pending item of a reconciliation queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue-assigned item id, increasing in creation order.
    pub item_id: u64,
    /// The task payload.
    pub data: Value,
    /// When the item was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    /// Lease expiry of the current claim, if claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "time::serde::rfc3339::option")]
    pub expire: Option<OffsetDateTime>,
}

impl QueueItem {
    /// Returns true if the item is unclaimed or its lease ran out at `now`.
    #[must_use]
    pub fn is_claimable(&self, now: OffsetDateTime) -> bool {
        self.expire.is_none_or(|expire| expire <= now)
    }
}

/// Payload of a deferred reconciliation: the entity whose translations may
/// have diverged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRevisionTask {
    pub entity_id: EntityId,
    /// The revision whose save triggered the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<RevisionId>,
    /// The translation the triggering save ran through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub langcode: Option<Langcode>,
}

impl ForwardRevisionTask {
    #[must_use]
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            revision_id: None,
            langcode: None,
        }
    }

    /// Records which save triggered the task.
    #[must_use]
    pub fn triggered_by(mut self, revision_id: RevisionId, langcode: Langcode) -> Self {
        self.revision_id = Some(revision_id);
        self.langcode = Some(langcode);
        self
    }

    pub fn to_value(&self) -> Result<Value, StorageError> {
        Ok(serde_json::to_value(self).map_err(CoreError::from)?)
    }

    pub fn from_value(value: &Value) -> Result<Self, StorageError> {
        Ok(Self::deserialize(value).map_err(CoreError::from)?)
    }
}
