//! In-memory reconciliation queues.
//!
//! Queues live in an [`InMemoryQueueStore`]; every [`InMemoryQueue`] handle
//! obtained from the same store for the same name sees the same items.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ctw_storage::{DEFAULT_LEASE, QueueItem, ReconciliationQueue, StorageError};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct QueueState {
    items: BTreeMap<u64, QueueItem>,
    next_id: u64,
}

type Queues = Arc<Mutex<HashMap<String, QueueState>>>;

/// Registry of named in-memory queues.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueueStore {
    queues: Queues,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the queue called `name`.
    ///
    /// The queue itself is created lazily, by `create_queue` or the first
    /// `create_item`.
    pub fn queue(&self, name: impl Into<String>) -> InMemoryQueue {
        InMemoryQueue {
            name: name.into(),
            queues: Arc::clone(&self.queues),
        }
    }

    /// Names of the queues that currently exist.
    pub async fn queue_names(&self) -> Vec<String> {
        let queues = self.queues.lock().await;
        let mut names: Vec<String> = queues.keys().cloned().collect();
        names.sort();
        names
    }
}

/// A handle to one named queue of an [`InMemoryQueueStore`].
#[derive(Debug, Clone)]
pub struct InMemoryQueue {
    name: String,
    queues: Queues,
}

impl InMemoryQueue {
    /// A standalone queue with its own backing store.
    pub fn new(name: impl Into<String>) -> Self {
        InMemoryQueueStore::new().queue(name)
    }
}

#[async_trait]
impl ReconciliationQueue for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_queue(&self) -> Result<(), StorageError> {
        let mut queues = self.queues.lock().await;
        queues.entry(self.name.clone()).or_default();
        Ok(())
    }

    async fn create_item(&self, data: Value) -> Result<u64, StorageError> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(self.name.clone()).or_default();
        state.next_id += 1;
        let item_id = state.next_id;
        state.items.insert(
            item_id,
            QueueItem {
                item_id,
                data,
                created: OffsetDateTime::now_utc(),
                expire: None,
            },
        );
        trace!(queue = %self.name, item_id, "Created queue item");
        Ok(item_id)
    }

    async fn number_of_items(&self) -> Result<usize, StorageError> {
        let queues = self.queues.lock().await;
        Ok(queues.get(&self.name).map_or(0, |state| state.items.len()))
    }

    async fn claim_item(&self, lease: Option<Duration>) -> Result<Option<QueueItem>, StorageError> {
        let mut queues = self.queues.lock().await;
        let Some(state) = queues.get_mut(&self.name) else {
            return Ok(None);
        };

        let now = OffsetDateTime::now_utc();
        let lease = lease.unwrap_or(DEFAULT_LEASE);
        let expire = time::Duration::try_from(lease)
            .ok()
            .and_then(|lease| now.checked_add(lease))
            .ok_or_else(|| {
                StorageError::internal(format!("lease of {lease:?} overflows the expiry time"))
            })?;
        let Some(item) = state.items.values_mut().find(|item| item.is_claimable(now)) else {
            return Ok(None);
        };
        item.expire = Some(expire);

        debug!(queue = %self.name, item_id = item.item_id, "Claimed queue item");
        Ok(Some(item.clone()))
    }

    async fn delete_item(&self, item: &QueueItem) -> Result<(), StorageError> {
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(&self.name)
            .ok_or_else(|| StorageError::queue_missing(&self.name))?;
        state
            .items
            .remove(&item.item_id)
            .ok_or_else(|| StorageError::queue_item_not_found(&self.name, item.item_id))?;
        trace!(queue = %self.name, item_id = item.item_id, "Deleted queue item");
        Ok(())
    }

    async fn release_item(&self, item: &QueueItem) -> Result<(), StorageError> {
        let mut queues = self.queues.lock().await;
        let state = queues
            .get_mut(&self.name)
            .ok_or_else(|| StorageError::queue_missing(&self.name))?;
        state
            .items
            .get_mut(&item.item_id)
            .ok_or_else(|| StorageError::queue_item_not_found(&self.name, item.item_id))?
            .expire = None;
        trace!(queue = %self.name, item_id = item.item_id, "Released queue item");
        Ok(())
    }

    async fn delete_queue(&self) -> Result<(), StorageError> {
        let mut queues = self.queues.lock().await;
        queues.remove(&self.name);
        debug!(queue = %self.name, "Deleted queue");
        Ok(())
    }
}
