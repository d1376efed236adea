//! End-of-cycle teardown callbacks.
//!
//! The hosting environment calls [`CycleTeardown::run`] once per unit of
//! work, after the main business logic has committed. Subscribers run in
//! descending priority order, so low priorities run late. A failing
//! subscriber is logged and the remaining ones still run.

use std::sync::Arc;

use async_trait::async_trait;
use ctw_storage::StorageError;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::drain::EndOfCycleDrainer;

/// Priority of the forward revision drain: after other teardown work that
/// may still enqueue reconciliation tasks.
pub const DRAIN_PRIORITY: i32 = -1024;

/// Error type for teardown subscribers.
#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    #[error("Teardown failed: {0}")]
    Execution(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TeardownError {
    pub fn execution(msg: impl Into<String>) -> Self {
        TeardownError::Execution(msg.into())
    }
}

/// A callback run when a processing cycle ends.
#[async_trait]
pub trait TerminateSubscriber: Send + Sync {
    /// Unique name for this subscriber (for logging).
    fn name(&self) -> &str;

    /// Higher priorities run first.
    fn priority(&self) -> i32 {
        0
    }

    async fn on_terminate(&self) -> Result<(), TeardownError>;
}

/// Outcome of one teardown run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Subscribers that completed, in run order.
    pub completed: Vec<String>,
    /// Subscribers that failed, in run order.
    pub failed: Vec<String>,
}

/// Registry of end-of-cycle subscribers.
#[derive(Default)]
pub struct CycleTeardown {
    subscribers: RwLock<Vec<Arc<dyn TerminateSubscriber>>>,
}

impl CycleTeardown {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, subscriber: Arc<dyn TerminateSubscriber>) {
        let name = subscriber.name().to_string();
        let priority = subscriber.priority();
        let mut subscribers = self.subscribers.write().await;
        subscribers.push(subscriber);
        // Stable, so equal priorities keep registration order
        subscribers.sort_by_key(|s| std::cmp::Reverse(s.priority()));
        debug!(subscriber = %name, priority, "Registered teardown subscriber");
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Runs every subscriber once.
    pub async fn run(&self) -> TeardownReport {
        let subscribers = self.subscribers.read().await.clone();
        let mut report = TeardownReport::default();

        for subscriber in subscribers {
            let name = subscriber.name().to_string();
            match subscriber.on_terminate().await {
                Ok(()) => {
                    debug!(subscriber = %name, "Teardown subscriber finished");
                    report.completed.push(name);
                }
                Err(e) => {
                    error!(subscriber = %name, error = %e, "Teardown subscriber failed");
                    report.failed.push(name);
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for CycleTeardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleTeardown").finish_non_exhaustive()
    }
}

#[async_trait]
impl TerminateSubscriber for EndOfCycleDrainer {
    fn name(&self) -> &str {
        "forward_revision_drain"
    }

    fn priority(&self) -> i32 {
        DRAIN_PRIORITY
    }

    async fn on_terminate(&self) -> Result<(), TeardownError> {
        self.drain().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct Recorder {
        name: &'static str,
        priority: i32,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl TerminateSubscriber for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn on_terminate(&self) -> Result<(), TeardownError> {
            self.log.lock().await.push(self.name);
            if self.fail {
                return Err(TeardownError::execution("broken"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_runs_in_descending_priority() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let teardown = CycleTeardown::new();
        for (name, priority) in [("late", DRAIN_PRIORITY), ("early", 250), ("middle", 0)] {
            teardown
                .subscribe(Arc::new(Recorder {
                    name,
                    priority,
                    fail: false,
                    log: log.clone(),
                }))
                .await;
        }
        assert_eq!(teardown.subscriber_count().await, 3);

        let report = teardown.run().await;
        assert_eq!(*log.lock().await, vec!["early", "middle", "late"]);
        assert_eq!(report.completed, vec!["early", "middle", "late"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_teardown() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let teardown = CycleTeardown::new();
        teardown
            .subscribe(Arc::new(Recorder {
                name: "broken",
                priority: 10,
                fail: true,
                log: log.clone(),
            }))
            .await;
        teardown
            .subscribe(Arc::new(Recorder {
                name: "after",
                priority: 0,
                fail: false,
                log: log.clone(),
            }))
            .await;

        let report = teardown.run().await;
        assert_eq!(report.failed, vec!["broken"]);
        assert_eq!(report.completed, vec!["after"]);
        assert_eq!(log.lock().await.len(), 2);
    }
}
