//! Storage error types for the revision store and reconciliation queue.
//!
//! This module defines all error types that can occur during storage and
//! queue operations.

use std::fmt;

use ctw_core::{CoreError, EntityId, RevisionId};

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested entity was not found.
    #[error("Entity not found: {entity_id}")]
    EntityNotFound {
        /// The entity that was not found.
        entity_id: EntityId,
    },

    /// The requested revision was not found.
    #[error("Revision not found: {entity_id}/{revision_id}")]
    RevisionNotFound {
        /// The entity the revision was looked up on.
        entity_id: EntityId,
        /// The revision that was not found.
        revision_id: RevisionId,
    },

    /// The entity moved on while a save was being prepared.
    #[error("Version conflict: expected latest revision {expected}, found {actual}")]
    VersionConflict {
        /// The revision the caller based its save on.
        expected: RevisionId,
        /// The entity's latest revision at save time.
        actual: RevisionId,
    },

    /// The revision data is invalid.
    #[error("Invalid revision: {message}")]
    InvalidRevision {
        /// Description of why the revision is invalid.
        message: String,
    },

    /// A queue operation ran against a queue that was never created.
    #[error("Queue does not exist: {name}")]
    QueueMissing {
        /// Name of the queue.
        name: String,
    },

    /// The queue item is not known to the queue (already deleted or never claimed).
    #[error("Queue item not found: {queue}#{item_id}")]
    QueueItemNotFound {
        /// Name of the queue.
        queue: String,
        /// The item id.
        item_id: u64,
    },

    /// Failed to connect to the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// A domain rule was violated.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `EntityNotFound` error.
    #[must_use]
    pub fn entity_not_found(entity_id: EntityId) -> Self {
        Self::EntityNotFound { entity_id }
    }

    /// Creates a new `RevisionNotFound` error.
    #[must_use]
    pub fn revision_not_found(entity_id: EntityId, revision_id: RevisionId) -> Self {
        Self::RevisionNotFound {
            entity_id,
            revision_id,
        }
    }

    /// Creates a new `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(expected: RevisionId, actual: RevisionId) -> Self {
        Self::VersionConflict { expected, actual }
    }

    /// Creates a new `InvalidRevision` error.
    #[must_use]
    pub fn invalid_revision(message: impl Into<String>) -> Self {
        Self::InvalidRevision {
            message: message.into(),
        }
    }

    /// Creates a new `QueueMissing` error.
    #[must_use]
    pub fn queue_missing(name: impl Into<String>) -> Self {
        Self::QueueMissing { name: name.into() }
    }

    /// Creates a new `QueueItemNotFound` error.
    #[must_use]
    pub fn queue_item_not_found(queue: impl Into<String>, item_id: u64) -> Self {
        Self::QueueItemNotFound {
            queue: queue.into(),
            item_id,
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the entity or revision was not found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound { .. } | Self::RevisionNotFound { .. }
        )
    }

    /// Returns `true` if this is a version conflict error.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Returns `true` if the backend could not be reached.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionError { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EntityNotFound { .. } => ErrorCategory::NotFound,
            Self::RevisionNotFound { .. } => ErrorCategory::NotFound,
            Self::VersionConflict { .. } => ErrorCategory::Conflict,
            Self::InvalidRevision { .. } => ErrorCategory::Validation,
            Self::Core(err) => match err.category() {
                ctw_core::ErrorCategory::Validation => ErrorCategory::Validation,
                ctw_core::ErrorCategory::NotFound => ErrorCategory::NotFound,
                ctw_core::ErrorCategory::Conflict => ErrorCategory::Conflict,
                ctw_core::ErrorCategory::Serialization => ErrorCategory::Serialization,
            },
            Self::QueueMissing { .. } => ErrorCategory::Queue,
            Self::QueueItemNotFound { .. } => ErrorCategory::Queue,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Entity or revision not found.
    NotFound,
    /// Concurrent modification.
    Conflict,
    /// Validation error.
    Validation,
    /// Payload could not be encoded or decoded.
    Serialization,
    /// Queue bookkeeping error.
    Queue,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Serialization => write!(f, "serialization"),
            Self::Queue => write!(f, "queue"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
