use thiserror::Error;

/// Core error types for content translation workflow operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid language code: {0}")]
    InvalidLangcode(String),

    #[error("Invalid moderation state: {0}")]
    InvalidModerationState(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Translation {langcode} is missing from entity {entity}")]
    MissingTranslation { entity: String, langcode: String },

    #[error("Translation {langcode} already exists")]
    DuplicateTranslation { langcode: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidLangcode error
    pub fn invalid_langcode(langcode: impl Into<String>) -> Self {
        Self::InvalidLangcode(langcode.into())
    }

    /// Create a new InvalidModerationState error
    pub fn invalid_moderation_state(state: impl Into<String>) -> Self {
        Self::InvalidModerationState(state.into())
    }

    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new MissingTranslation error
    pub fn missing_translation(entity: impl Into<String>, langcode: impl Into<String>) -> Self {
        Self::MissingTranslation {
            entity: entity.into(),
            langcode: langcode.into(),
        }
    }

    /// Create a new DuplicateTranslation error
    pub fn duplicate_translation(langcode: impl Into<String>) -> Self {
        Self::DuplicateTranslation {
            langcode: langcode.into(),
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidLangcode(_) | Self::InvalidModerationState(_) | Self::InvalidId(_) => {
                ErrorCategory::Validation
            }
            Self::MissingTranslation { .. } => ErrorCategory::NotFound,
            Self::DuplicateTranslation { .. } => ErrorCategory::Conflict,
            Self::JsonError(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_langcode("EN_us!");
        assert_eq!(err.to_string(), "Invalid language code: EN_us!");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_missing_translation_error() {
        let err = CoreError::missing_translation("7", "fr");
        assert_eq!(err.to_string(), "Translation fr is missing from entity 7");
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_duplicate_translation_error() {
        let err = CoreError::duplicate_translation("de");
        assert_eq!(err.to_string(), "Translation de already exists");
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(err.category().to_string(), "conflict");
    }
}
