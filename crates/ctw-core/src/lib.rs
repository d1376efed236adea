pub mod error;
pub mod id;
pub mod language;
pub mod moderation;
pub mod revision;

pub use error::{CoreError, ErrorCategory, Result};
pub use id::{EntityId, RevisionId};
pub use language::Langcode;
pub use moderation::ModerationState;
pub use revision::{NewEntity, Revision, TranslationSnapshot};
