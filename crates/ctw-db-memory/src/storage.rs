use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use ctw_core::{EntityId, Langcode, NewEntity, Revision, RevisionId, TranslationSnapshot};
use ctw_storage::{RevisionStorage, SaveRequest, StorageError};
use papaya::HashMap as PapayaHashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

/// Per-entity bookkeeping: languages, revision order and the default pointer.
#[derive(Debug, Clone)]
pub(crate) struct EntityRecord {
    pub(crate) languages: Vec<Langcode>,
    pub(crate) revision_ids: Vec<RevisionId>,
    pub(crate) default_revision: RevisionId,
}

impl EntityRecord {
    fn latest(&self) -> RevisionId {
        // A record is only inserted together with its first revision
        self.revision_ids
            .last()
            .copied()
            .unwrap_or(self.default_revision)
    }
}

/// In-memory revision store.
///
/// This storage implementation provides:
/// - Lock-free reads of saved revisions via papaya::HashMap
/// - Serialized saves through the entity index lock, so the latest-revision
///   check and the append happen atomically
/// - Store-wide increasing revision ids
/// - The default revision and reader view contracts of [`RevisionStorage`]
#[derive(Debug)]
pub struct InMemoryRevisionStorage {
    /// Saved revisions, immutable once inserted
    pub(crate) revisions: Arc<PapayaHashMap<RevisionId, Revision>>,
    /// Entity index: entity -> languages, revision order and default pointer
    pub(crate) entities: Arc<RwLock<HashMap<EntityId, EntityRecord>>>,
    /// Atomic counter for generating entity IDs
    entity_counter: AtomicU64,
    /// Atomic counter for generating revision IDs
    revision_counter: AtomicU64,
}

impl Default for InMemoryRevisionStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRevisionStorage {
    /// Creates a new, empty in-memory storage.
    pub fn new() -> Self {
        Self {
            revisions: Arc::new(PapayaHashMap::new()),
            entities: Arc::new(RwLock::new(HashMap::new())),
            entity_counter: AtomicU64::new(1),
            revision_counter: AtomicU64::new(1),
        }
    }

    fn next_entity_id(&self) -> EntityId {
        EntityId(self.entity_counter.fetch_add(1, Ordering::SeqCst))
    }

    fn next_revision_id(&self) -> RevisionId {
        RevisionId(self.revision_counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Reads a stored revision and stamps the current default flag on it.
    fn get_revision(&self, record: &EntityRecord, revision_id: RevisionId) -> Option<Revision> {
        let guard = self.revisions.pin();
        guard.get(&revision_id).cloned().map(|mut revision| {
            revision.default = record.default_revision == revision_id;
            revision
        })
    }

    /// Number of revisions stored for an entity.
    pub async fn revision_count(&self, entity_id: EntityId) -> usize {
        let entities = self.entities.read().await;
        entities
            .get(&entity_id)
            .map(|record| record.revision_ids.len())
            .unwrap_or(0)
    }

    /// All revision ids of an entity, oldest first.
    pub async fn revision_ids(&self, entity_id: EntityId) -> Vec<RevisionId> {
        let entities = self.entities.read().await;
        entities
            .get(&entity_id)
            .map(|record| record.revision_ids.clone())
            .unwrap_or_default()
    }
}

/// Orders `translations` by `languages`, requiring exactly one snapshot per
/// language.
fn order_translations(
    languages: &[Langcode],
    translations: Vec<TranslationSnapshot>,
) -> Result<Vec<TranslationSnapshot>, StorageError> {
    if translations.len() != languages.len() {
        return Err(StorageError::invalid_revision(format!(
            "expected {} translations, got {}",
            languages.len(),
            translations.len()
        )));
    }
    let mut slots: Vec<Option<TranslationSnapshot>> = vec![None; languages.len()];
    for translation in translations {
        let position = languages
            .iter()
            .position(|l| *l == translation.langcode)
            .ok_or_else(|| {
                StorageError::invalid_revision(format!(
                    "unsupported translation language: {}",
                    translation.langcode
                ))
            })?;
        if slots[position].is_some() {
            return Err(StorageError::invalid_revision(format!(
                "duplicate translation language: {}",
                translation.langcode
            )));
        }
        slots[position] = Some(translation);
    }
    // Lengths match and no slot was filled twice, so every slot is filled
    Ok(slots.into_iter().flatten().collect())
}

#[async_trait]
impl RevisionStorage for InMemoryRevisionStorage {
    async fn create(&self, entity: NewEntity) -> Result<Revision, StorageError> {
        let translations = entity.into_translations();
        if translations.is_empty() {
            return Err(StorageError::invalid_revision(
                "an entity needs at least one translation",
            ));
        }

        let entity_id = self.next_entity_id();
        let revision_id = self.next_revision_id();
        let languages: Vec<Langcode> = translations.iter().map(|t| t.langcode.clone()).collect();

        let revision = Revision {
            entity_id,
            revision_id,
            default: true,
            created_at: OffsetDateTime::now_utc(),
            translations: translations
                .into_iter()
                .map(|mut t| {
                    t.translation_affected = true;
                    t.default_revision = true;
                    (t.langcode.clone(), t)
                })
                .collect(),
        };

        let mut entities = self.entities.write().await;
        {
            let guard = self.revisions.pin();
            guard.insert(revision_id, revision.clone());
        }
        entities.insert(
            entity_id,
            EntityRecord {
                languages,
                revision_ids: vec![revision_id],
                default_revision: revision_id,
            },
        );

        debug!(entity_id = %entity_id, revision_id = %revision_id, "Created entity");
        Ok(revision)
    }

    async fn translation_languages(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<Langcode>, StorageError> {
        let entities = self.entities.read().await;
        entities
            .get(&entity_id)
            .map(|record| record.languages.clone())
            .ok_or_else(|| StorageError::entity_not_found(entity_id))
    }

    async fn load_default(&self, entity_id: EntityId) -> Result<Option<Revision>, StorageError> {
        let entities = self.entities.read().await;
        let Some(record) = entities.get(&entity_id) else {
            return Ok(None);
        };
        self.get_revision(record, record.default_revision)
            .map(Some)
            .ok_or_else(|| StorageError::revision_not_found(entity_id, record.default_revision))
    }

    async fn load_latest(&self, entity_id: EntityId) -> Result<Option<Revision>, StorageError> {
        let entities = self.entities.read().await;
        let Some(record) = entities.get(&entity_id) else {
            return Ok(None);
        };
        let latest = record.latest();
        self.get_revision(record, latest)
            .map(Some)
            .ok_or_else(|| StorageError::revision_not_found(entity_id, latest))
    }

    async fn load_revision(
        &self,
        entity_id: EntityId,
        revision_id: RevisionId,
    ) -> Result<Option<Revision>, StorageError> {
        let entities = self.entities.read().await;
        let Some(record) = entities.get(&entity_id) else {
            return Ok(None);
        };
        if !record.revision_ids.contains(&revision_id) {
            return Ok(None);
        }
        Ok(self.get_revision(record, revision_id))
    }

    async fn latest_affected_revision(
        &self,
        entity_id: EntityId,
        langcode: &Langcode,
    ) -> Result<Option<RevisionId>, StorageError> {
        let entities = self.entities.read().await;
        let record = entities
            .get(&entity_id)
            .ok_or_else(|| StorageError::entity_not_found(entity_id))?;

        let guard = self.revisions.pin();
        Ok(record.revision_ids.iter().rev().copied().find(|id| {
            guard
                .get(id)
                .and_then(|revision| revision.translation(langcode))
                .is_some_and(|t| t.translation_affected)
        }))
    }

    async fn save(
        &self,
        entity_id: EntityId,
        request: SaveRequest,
    ) -> Result<Revision, StorageError> {
        let SaveRequest {
            translations,
            via,
            if_latest,
        } = request;

        // Hold the index lock for the whole save so the conflict check and
        // the append cannot interleave with another save
        let mut entities = self.entities.write().await;
        let record = entities
            .get_mut(&entity_id)
            .ok_or_else(|| StorageError::entity_not_found(entity_id))?;

        let latest = record.latest();
        if let Some(expected) = if_latest {
            if expected != latest {
                return Err(StorageError::version_conflict(expected, latest));
            }
        }

        let translations = order_translations(&record.languages, translations)?;
        let via_translation = translations
            .iter()
            .find(|t| t.langcode == via)
            .ok_or_else(|| {
                StorageError::invalid_revision(format!("save runs through unknown translation {via}"))
            })?;
        let becomes_default = via_translation.moderation_state.is_default_revision_state()
            && via_translation.default_revision;

        let revision_id = self.next_revision_id();
        let revision = Revision {
            entity_id,
            revision_id,
            default: becomes_default,
            created_at: OffsetDateTime::now_utc(),
            translations: translations
                .into_iter()
                .map(|mut t| {
                    t.translation_affected = t.langcode == via;
                    t.default_revision = becomes_default;
                    (t.langcode.clone(), t)
                })
                .collect(),
        };

        {
            let guard = self.revisions.pin();
            guard.insert(revision_id, revision.clone());
        }
        record.revision_ids.push(revision_id);
        if becomes_default {
            record.default_revision = revision_id;
        }

        debug!(
            entity_id = %entity_id,
            revision_id = %revision_id,
            via = %via,
            default = becomes_default,
            "Saved revision"
        );
        Ok(revision)
    }

    async fn load_current_translation(
        &self,
        entity_id: EntityId,
        langcode: &Langcode,
    ) -> Result<Option<TranslationSnapshot>, StorageError> {
        let entities = self.entities.read().await;
        let Some(record) = entities.get(&entity_id) else {
            return Ok(None);
        };

        // Only saves made through this language count. Other languages' saves
        // may carry an outdated copy of it from a stale base revision.
        let guard = self.revisions.pin();
        let own_snapshots = record
            .revision_ids
            .iter()
            .rev()
            .filter(|id| **id <= record.default_revision)
            .filter_map(|id| guard.get(id).and_then(|revision| revision.translation(langcode)))
            .filter(|t| t.translation_affected);

        for snapshot in own_snapshots {
            if snapshot.is_published() {
                return Ok(Some(snapshot.clone()));
            }
            if snapshot.moderation_state.is_default_revision_state() {
                // Archived: withdrawn from readers
                return Ok(None);
            }
        }
        Ok(None)
    }

    fn backend_name(&self) -> &'static str {
        "in-memory-papaya"
    }
}
