use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Moderation state of one translation within one revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationState {
    #[default]
    Draft,
    Published,
    Archived,
}

impl ModerationState {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    /// Whether content in this state is externally visible.
    pub fn is_published_state(&self) -> bool {
        matches!(self, Self::Published)
    }

    /// Whether saving a translation in this state makes the revision the
    /// entity's default revision.
    pub fn is_default_revision_state(&self) -> bool {
        matches!(self, Self::Published | Self::Archived)
    }
}

impl fmt::Display for ModerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModerationState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            _ => Err(CoreError::invalid_moderation_state(s)),
        }
    }
}
