use std::sync::Arc;

use ctw_storage::{DynQueue, DynStorage};
use serde::{Deserialize, Serialize};

use crate::{InMemoryQueueStore, InMemoryRevisionStorage};

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-memory store on top of papaya::HashMap, with in-memory queues
    #[default]
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Create a revision store for the given backend.
pub fn create_storage(backend: StorageBackend) -> DynStorage {
    match backend {
        StorageBackend::Memory => Arc::new(InMemoryRevisionStorage::new()),
    }
}

/// Create the named reconciliation queue for the given backend.
///
/// Each call starts a fresh queue store, so producers and consumers must
/// share the returned handle.
pub fn create_queue(backend: StorageBackend, name: &str) -> DynQueue {
    match backend {
        StorageBackend::Memory => Arc::new(InMemoryQueueStore::new().queue(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctw_storage::{ReconciliationQueue, RevisionStorage};

    #[test]
    fn test_backend_serde() {
        let backend: StorageBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, StorageBackend::Memory);
        assert_eq!(backend.to_string(), "memory");
        assert!(serde_json::from_str::<StorageBackend>("\"postgres\"").is_err());
    }

    #[tokio::test]
    async fn test_create_backends() {
        let storage = create_storage(StorageBackend::Memory);
        assert_eq!(storage.backend_name(), "in-memory-papaya");

        let queue = create_queue(StorageBackend::Memory, "q");
        assert_eq!(queue.name(), "q");
        queue.create_item(serde_json::json!(1)).await.unwrap();
        assert_eq!(queue.number_of_items().await.unwrap(), 1);
    }
}
