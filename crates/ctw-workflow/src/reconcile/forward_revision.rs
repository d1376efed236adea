//! Forward revision reconciliation for one entity.

use std::time::Duration;

use async_trait::async_trait;
use ctw_core::{EntityId, Langcode, Revision, TranslationSnapshot};
use ctw_storage::{ForwardRevisionTask, RevisionStorage, SaveRequest, StorageError};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::worker::{QueueWorker, WorkerError};

/// Worker identity, also the default name of the queue it drains.
pub const WORKER_ID: &str = "content_translation_workflow__add_new_forward_revision";

/// What a reconciliation pass decided for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardPlan {
    /// Every translation is published; nothing to carry forward.
    Settled,
    /// Some translation is unpublished, but the latest revision already holds
    /// each language's own latest content.
    Current { anchor: Langcode },
    /// Save `translations` as a forward revision through `anchor`.
    Write {
        anchor: Langcode,
        translations: Vec<TranslationSnapshot>,
    },
}

/// Decides whether `latest` needs a forward revision.
///
/// `carried` holds each language's own latest snapshot, in the entity's
/// language enumeration order. The first unpublished language anchors the
/// save. The returned translations do not bear the default revision flag, so
/// the save never promotes the forward revision to default.
pub fn plan_forward_revision(latest: &Revision, carried: Vec<TranslationSnapshot>) -> ForwardPlan {
    let Some(anchor) = carried
        .iter()
        .find(|t| !t.is_published())
        .map(|t| t.langcode.clone())
    else {
        return ForwardPlan::Settled;
    };

    let up_to_date = carried.len() == latest.translations.len()
        && carried.iter().all(|t| {
            latest
                .translation(&t.langcode)
                .is_some_and(|current| current.same_content(t))
        });
    if up_to_date {
        return ForwardPlan::Current { anchor };
    }

    let translations = carried
        .into_iter()
        .map(|mut t| {
            t.set_default_revision(false);
            t.translation_affected = false;
            t
        })
        .collect();
    ForwardPlan::Write {
        anchor,
        translations,
    }
}

/// Result of [`ForwardRevisionReconciler::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The entity no longer exists.
    Missing,
    Settled,
    Current,
    /// A forward revision was saved.
    Written(Revision),
}

/// Queue worker that writes forward revisions for diverged entities.
pub struct ForwardRevisionReconciler<S: RevisionStorage> {
    storage: S,
    lease_time: Option<Duration>,
}

impl<S: RevisionStorage> ForwardRevisionReconciler<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            lease_time: None,
        }
    }

    /// Sets the lease the drainer claims items for.
    pub fn with_lease_time(mut self, lease_time: Option<Duration>) -> Self {
        self.lease_time = lease_time;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Re-reads the entity and writes a forward revision if one is needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::VersionConflict` if another save landed between
    /// reading the latest revision and writing the forward one.
    pub async fn reconcile(&self, entity_id: EntityId) -> Result<ReconcileOutcome, StorageError> {
        // 1. Load the latest revision
        let Some(latest) = self.storage.load_latest(entity_id).await? else {
            warn!(entity_id = %entity_id, "Entity no longer exists, skipping reconciliation");
            return Ok(ReconcileOutcome::Missing);
        };

        // 2. Collect each language's own latest snapshot
        let carried = self.own_latest_snapshots(&latest).await?;

        // 3. Decide
        let (anchor, translations) = match plan_forward_revision(&latest, carried) {
            ForwardPlan::Settled => {
                debug!(
                    entity_id = %entity_id,
                    revision_id = %latest.revision_id,
                    "All translations published, no forward revision needed"
                );
                return Ok(ReconcileOutcome::Settled);
            }
            ForwardPlan::Current { anchor } => {
                debug!(
                    entity_id = %entity_id,
                    revision_id = %latest.revision_id,
                    anchor = %anchor,
                    "Latest revision already carries every translation"
                );
                return Ok(ReconcileOutcome::Current);
            }
            ForwardPlan::Write {
                anchor,
                translations,
            } => (anchor, translations),
        };

        // 4. Save through the anchor, guarded against concurrent saves
        let request = SaveRequest::new(translations, anchor.clone()).if_latest(latest.revision_id);
        let saved = self.storage.save(entity_id, request).await?;

        info!(
            entity_id = %entity_id,
            base_revision_id = %latest.revision_id,
            revision_id = %saved.revision_id,
            anchor = %anchor,
            "Added forward revision"
        );
        Ok(ReconcileOutcome::Written(saved))
    }

    /// Each language's snapshot from the newest revision that changed it,
    /// falling back to the latest revision's snapshot.
    async fn own_latest_snapshots(
        &self,
        latest: &Revision,
    ) -> Result<Vec<TranslationSnapshot>, StorageError> {
        let entity_id = latest.entity_id;
        let mut carried = Vec::with_capacity(latest.translations.len());

        for (langcode, snapshot) in &latest.translations {
            let affected = self
                .storage
                .latest_affected_revision(entity_id, langcode)
                .await?;
            let own = match affected {
                Some(revision_id) if revision_id != latest.revision_id => self
                    .storage
                    .load_revision(entity_id, revision_id)
                    .await?
                    .and_then(|revision| revision.translation(langcode).cloned()),
                _ => None,
            };
            carried.push(own.unwrap_or_else(|| snapshot.clone()));
        }

        Ok(carried)
    }
}

#[async_trait]
impl<S: RevisionStorage> QueueWorker for ForwardRevisionReconciler<S> {
    fn id(&self) -> &str {
        WORKER_ID
    }

    fn lease_time(&self) -> Option<Duration> {
        self.lease_time
    }

    async fn process_item(&self, data: &Value) -> Result<(), WorkerError> {
        let task = ForwardRevisionTask::from_value(data)?;
        self.reconcile(task.entity_id).await?;
        Ok(())
    }
}

impl<S: RevisionStorage> std::fmt::Debug for ForwardRevisionReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardRevisionReconciler")
            .field("backend", &self.storage.backend_name())
            .field("lease_time", &self.lease_time)
            .finish()
    }
}
