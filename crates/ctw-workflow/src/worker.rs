//! Queue worker contract and its outcome taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use ctw_storage::StorageError;
use serde_json::Value;

/// Failure outcomes of processing one queue item.
///
/// Success is `Ok(())`; a worker that found nothing to do also succeeds.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Run the item again right away, within the same drain.
    #[error("Requeue requested: {0}")]
    Requeue(String),

    /// Something is wrong with the whole queue; stop draining for this cycle.
    #[error("Queue suspended: {0}")]
    Suspend(String),

    /// Any other fault. The item stays claimed until its lease runs out.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl WorkerError {
    pub fn requeue(msg: impl Into<String>) -> Self {
        WorkerError::Requeue(msg.into())
    }

    pub fn suspend(msg: impl Into<String>) -> Self {
        WorkerError::Suspend(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        WorkerError::Unexpected(anyhow::anyhow!(msg.into()))
    }
}

impl From<StorageError> for WorkerError {
    fn from(err: StorageError) -> Self {
        if err.is_version_conflict() {
            WorkerError::Requeue(err.to_string())
        } else if err.is_connection_error() {
            WorkerError::Suspend(err.to_string())
        } else {
            WorkerError::Unexpected(err.into())
        }
    }
}

/// Processes the payloads of one queue.
#[async_trait]
pub trait QueueWorker: Send + Sync {
    /// Worker identity, used in logs.
    fn id(&self) -> &str;

    /// Lease to claim items for. `None` uses the queue's default.
    fn lease_time(&self) -> Option<Duration> {
        None
    }

    async fn process_item(&self, data: &Value) -> Result<(), WorkerError>;
}
