//! In-memory backends for the content translation workflow.
//!
//! This crate provides an in-memory implementation of the `RevisionStorage`
//! trait, using a papaya lock-free HashMap for the immutable revisions, and a
//! lease-based in-memory implementation of `ReconciliationQueue`.
//!
//! # Example
//!
//! ```ignore
//! use ctw_db_memory::{InMemoryQueueStore, InMemoryRevisionStorage};
//! use ctw_storage::{EnqueuingStorage, RevisionStorage};
//!
//! let queues = InMemoryQueueStore::new();
//! let queue = Arc::new(queues.queue("content_translation_workflow__add_new_forward_revision"));
//! let storage = EnqueuingStorage::new(InMemoryRevisionStorage::new(), queue);
//!
//! let created = storage.create(entity).await?;
//! ```

pub mod factory;
pub mod queue;
pub mod storage;

// Re-export the storage traits for convenience
pub use ctw_storage::{ReconciliationQueue, RevisionStorage, StorageError};

pub use factory::{StorageBackend, create_queue, create_storage};
pub use queue::{InMemoryQueue, InMemoryQueueStore};
pub use storage::InMemoryRevisionStorage;
