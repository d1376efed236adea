use crate::error::{CoreError, Result};
use crate::id::{EntityId, RevisionId};
use crate::language::Langcode;
use crate::moderation::ModerationState;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One language's content and moderation state within a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationSnapshot {
    pub langcode: Langcode,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub moderation_state: ModerationState,
    /// Whether this translation bears the default revision flag.
    #[serde(default)]
    pub default_revision: bool,
    /// Whether the revision holding this snapshot changed this language.
    #[serde(default)]
    pub translation_affected: bool,
}

impl TranslationSnapshot {
    pub fn new(langcode: Langcode, title: impl Into<String>, state: ModerationState) -> Self {
        Self {
            langcode,
            title: title.into(),
            body: None,
            moderation_state: state,
            default_revision: state.is_default_revision_state(),
            translation_affected: false,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Publication flag, derived from the moderation state.
    pub fn is_published(&self) -> bool {
        self.moderation_state.is_published_state()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_body(&mut self, body: Option<String>) {
        self.body = body;
    }

    /// Moves the translation to `state`.
    ///
    /// The default revision flag follows the state: saving through a
    /// translation in a default-bearing state promotes the revision.
    pub fn set_moderation_state(&mut self, state: ModerationState) {
        self.moderation_state = state;
        self.default_revision = state.is_default_revision_state();
    }

    pub fn set_default_revision(&mut self, default_revision: bool) {
        self.default_revision = default_revision;
    }

    /// Compares title, body and moderation state, ignoring revision markers.
    pub fn same_content(&self, other: &TranslationSnapshot) -> bool {
        self.langcode == other.langcode
            && self.title == other.title
            && self.body == other.body
            && self.moderation_state == other.moderation_state
    }
}

/// An immutable snapshot of an entity, one translation per supported language.
///
/// Translations iterate in the entity's language enumeration order: the
/// source language first, then translations in the order they were added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub entity_id: EntityId,
    pub revision_id: RevisionId,
    pub default: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub translations: IndexMap<Langcode, TranslationSnapshot>,
}

impl Revision {
    pub fn is_default_revision(&self) -> bool {
        self.default
    }

    pub fn translation(&self, langcode: &Langcode) -> Option<&TranslationSnapshot> {
        self.translations.get(langcode)
    }

    pub fn translation_mut(&mut self, langcode: &Langcode) -> Option<&mut TranslationSnapshot> {
        self.translations.get_mut(langcode)
    }

    /// Like [`Revision::translation`], but a missing language is an error.
    pub fn get_translation(&self, langcode: &Langcode) -> Result<&TranslationSnapshot> {
        self.translations.get(langcode).ok_or_else(|| {
            CoreError::missing_translation(self.entity_id.to_string(), langcode.as_str())
        })
    }

    pub fn get_translation_mut(&mut self, langcode: &Langcode) -> Result<&mut TranslationSnapshot> {
        let entity = self.entity_id;
        self.translations
            .get_mut(langcode)
            .ok_or_else(|| CoreError::missing_translation(entity.to_string(), langcode.as_str()))
    }

    pub fn translation_languages(&self) -> impl Iterator<Item = &Langcode> {
        self.translations.keys()
    }

    pub fn translations(&self) -> impl Iterator<Item = &TranslationSnapshot> {
        self.translations.values()
    }

    /// Languages whose snapshot in this revision is not published, in
    /// enumeration order.
    pub fn unpublished_languages(&self) -> Vec<Langcode> {
        self.translations
            .values()
            .filter(|t| !t.is_published())
            .map(|t| t.langcode.clone())
            .collect()
    }

    pub fn into_translations(self) -> Vec<TranslationSnapshot> {
        self.translations.into_values().collect()
    }
}

/// The translations of an entity that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEntity {
    translations: IndexMap<Langcode, TranslationSnapshot>,
}

impl NewEntity {
    /// Starts a new entity from its source-language translation.
    pub fn new(source: TranslationSnapshot) -> Self {
        let mut translations = IndexMap::new();
        translations.insert(source.langcode.clone(), source);
        Self { translations }
    }

    pub fn add_translation(mut self, translation: TranslationSnapshot) -> Result<Self> {
        if self.translations.contains_key(&translation.langcode) {
            return Err(CoreError::duplicate_translation(translation.langcode.as_str()));
        }
        self.translations
            .insert(translation.langcode.clone(), translation);
        Ok(self)
    }

    pub fn source_langcode(&self) -> Option<&Langcode> {
        self.translations.keys().next()
    }

    pub fn translations(&self) -> impl Iterator<Item = &TranslationSnapshot> {
        self.translations.values()
    }

    pub fn into_translations(self) -> Vec<TranslationSnapshot> {
        self.translations.into_values().collect()
    }
}
