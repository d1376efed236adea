//! End-of-cycle queue draining.
//!
//! The drainer runs once per processing cycle, after the cycle's main work,
//! and claims items until the queue reports empty. Items enqueued while the
//! drain is running are picked up by later claims of the same drain.

use std::sync::Arc;
use std::time::Duration;

use ctw_storage::{DynQueue, ReconciliationQueue, StorageError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::worker::{QueueWorker, WorkerError};

/// Safety bounds of a single drain. `None` leaves that axis unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainLimits {
    /// Maximum number of items claimed per drain.
    pub max_iterations: Option<usize>,
    /// Wall-clock budget per drain.
    pub time_budget: Option<Duration>,
}

impl DrainLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_time_budget(mut self, time_budget: Duration) -> Self {
        self.time_budget = Some(time_budget);
        self
    }

    fn exceeded(&self, iterations: usize, started: Instant) -> bool {
        self.max_iterations.is_some_and(|max| iterations >= max)
            || self
                .time_budget
                .is_some_and(|budget| started.elapsed() >= budget)
    }
}

/// Why a drain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainOutcome {
    /// The queue reported no claimable item.
    Drained,
    /// The worker asked to suspend the queue.
    Suspended,
    /// A [`DrainLimits`] bound was hit; remaining items wait for the next cycle.
    LimitReached,
}

/// Counters of one drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub cycle_id: Uuid,
    pub claimed: usize,
    pub deleted: usize,
    pub requeued: usize,
    pub failed: usize,
    pub outcome: DrainOutcome,
}

impl DrainReport {
    fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            claimed: 0,
            deleted: 0,
            requeued: 0,
            failed: 0,
            outcome: DrainOutcome::Drained,
        }
    }
}

/// Drains one queue through one worker.
pub struct EndOfCycleDrainer {
    queue: DynQueue,
    worker: Arc<dyn QueueWorker>,
    limits: DrainLimits,
    last_report: Mutex<Option<DrainReport>>,
}

impl EndOfCycleDrainer {
    pub fn new(queue: DynQueue, worker: Arc<dyn QueueWorker>) -> Self {
        Self {
            queue,
            worker,
            limits: DrainLimits::default(),
            last_report: Mutex::new(None),
        }
    }

    pub fn with_limits(mut self, limits: DrainLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> DrainLimits {
        self.limits
    }

    pub fn queue(&self) -> &DynQueue {
        &self.queue
    }

    /// The report of the most recent completed drain.
    pub async fn last_report(&self) -> Option<DrainReport> {
        self.last_report.lock().await.clone()
    }

    /// Claims and processes items until the queue is empty, the worker
    /// suspends the queue, or a limit is hit.
    ///
    /// # Errors
    ///
    /// Returns the queue's error if the queue cannot be created or an item
    /// cannot be claimed. Failures of individual items never fail the drain.
    pub async fn drain(&self) -> Result<DrainReport, StorageError> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!(
            "drain",
            cycle_id = %cycle_id,
            queue = %self.queue.name(),
            worker = %self.worker.id()
        );

        let report = self.drain_inner(cycle_id).instrument(span).await?;
        *self.last_report.lock().await = Some(report.clone());
        Ok(report)
    }

    async fn drain_inner(&self, cycle_id: Uuid) -> Result<DrainReport, StorageError> {
        let mut report = DrainReport::new(cycle_id);
        let started = Instant::now();
        let lease = self.worker.lease_time();

        self.queue.create_queue().await?;

        loop {
            if self.limits.exceeded(report.claimed, started) {
                report.outcome = DrainOutcome::LimitReached;
                warn!(
                    claimed = report.claimed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Drain limit reached, leaving remaining items for the next cycle"
                );
                break;
            }

            let Some(item) = self.queue.claim_item(lease).await? else {
                break;
            };
            report.claimed += 1;

            match self.worker.process_item(&item.data).await {
                Ok(()) => match self.queue.delete_item(&item).await {
                    Ok(()) => report.deleted += 1,
                    Err(e) => {
                        report.failed += 1;
                        error!(
                            item_id = item.item_id,
                            category = %e.category(),
                            error = %e,
                            "Failed to delete processed item"
                        );
                    }
                },
                Err(WorkerError::Requeue(reason)) => {
                    report.requeued += 1;
                    debug!(item_id = item.item_id, reason = %reason, "Requeueing item");
                    if let Err(e) = self.queue.release_item(&item).await {
                        error!(
                            item_id = item.item_id,
                            category = %e.category(),
                            error = %e,
                            "Failed to release item"
                        );
                    }
                }
                Err(WorkerError::Suspend(reason)) => {
                    report.failed += 1;
                    report.outcome = DrainOutcome::Suspended;
                    if let Err(e) = self.queue.release_item(&item).await {
                        error!(
                            item_id = item.item_id,
                            category = %e.category(),
                            error = %e,
                            "Failed to release item"
                        );
                    }
                    error!(
                        item_id = item.item_id,
                        reason = %reason,
                        "Queue suspended, stopping drain for this cycle"
                    );
                    break;
                }
                Err(WorkerError::Unexpected(e)) => {
                    // Left claimed: the item comes back once its lease expires
                    report.failed += 1;
                    error!(
                        item_id = item.item_id,
                        category = %fault_category(&e),
                        error = %e,
                        "Failed to process item"
                    );
                }
            }
        }

        info!(
            claimed = report.claimed,
            deleted = report.deleted,
            requeued = report.requeued,
            failed = report.failed,
            outcome = ?report.outcome,
            "Drain finished"
        );
        Ok(report)
    }
}

/// Storage category of a worker fault, `"other"` for faults from elsewhere.
fn fault_category(err: &anyhow::Error) -> String {
    err.downcast_ref::<StorageError>()
        .map_or_else(|| "other".to_string(), |e| e.category().to_string())
}

impl std::fmt::Debug for EndOfCycleDrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndOfCycleDrainer")
            .field("queue", &self.queue.name())
            .field("worker", &self.worker.id())
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ctw_db_memory::InMemoryQueue;
    use serde_json::{Value, json};
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Done,
        Requeue,
        Suspend,
        Fail,
    }

    /// Replays a script of outcomes; succeeds once the script runs out.
    struct ScriptedWorker {
        steps: Mutex<VecDeque<Step>>,
        seen: Mutex<Vec<Value>>,
        spawn_into: Option<DynQueue>,
    }

    impl ScriptedWorker {
        fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into_iter().collect()),
                seen: Mutex::new(Vec::new()),
                spawn_into: None,
            }
        }

        fn succeeding() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl QueueWorker for ScriptedWorker {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn process_item(&self, data: &Value) -> Result<(), WorkerError> {
            self.seen.lock().await.push(data.clone());
            if let Some(queue) = &self.spawn_into {
                if data == &json!("parent") {
                    queue.create_item(json!("child")).await?;
                }
            }
            match self.steps.lock().await.pop_front().unwrap_or(Step::Done) {
                Step::Done => Ok(()),
                Step::Requeue => Err(WorkerError::requeue("try again")),
                Step::Suspend => Err(WorkerError::suspend("backend unavailable")),
                Step::Fail => Err(WorkerError::unexpected("boom")),
            }
        }
    }

    fn queue() -> DynQueue {
        Arc::new(InMemoryQueue::new("test"))
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let queue = queue();
        let drainer = EndOfCycleDrainer::new(queue.clone(), Arc::new(ScriptedWorker::succeeding()));

        let report = drainer.drain().await.unwrap();
        assert_eq!(report.outcome, DrainOutcome::Drained);
        assert_eq!(report.claimed, 0);
        assert_eq!(drainer.last_report().await, Some(report));
    }

    #[tokio::test]
    async fn test_success_deletes_items() {
        let queue = queue();
        for n in 0..3 {
            queue.create_item(json!(n)).await.unwrap();
        }
        let worker = Arc::new(ScriptedWorker::succeeding());
        let drainer = EndOfCycleDrainer::new(queue.clone(), worker.clone());

        let report = drainer.drain().await.unwrap();
        assert_eq!(report.deleted, 3);
        assert_eq!(queue.number_of_items().await.unwrap(), 0);
        assert_eq!(*worker.seen.lock().await, vec![json!(0), json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_requeue_is_retried_in_same_drain() {
        let queue = queue();
        queue.create_item(json!("task")).await.unwrap();
        let drainer =
            EndOfCycleDrainer::new(queue.clone(), Arc::new(ScriptedWorker::new([Step::Requeue])));

        let report = drainer.drain().await.unwrap();
        assert_eq!(report.claimed, 2);
        assert_eq!(report.requeued, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(queue.number_of_items().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_suspend_stops_and_releases() {
        let queue = queue();
        queue.create_item(json!(1)).await.unwrap();
        queue.create_item(json!(2)).await.unwrap();
        let drainer =
            EndOfCycleDrainer::new(queue.clone(), Arc::new(ScriptedWorker::new([Step::Suspend])));

        let report = drainer.drain().await.unwrap();
        assert_eq!(report.outcome, DrainOutcome::Suspended);
        assert_eq!(report.claimed, 1);
        assert_eq!(queue.number_of_items().await.unwrap(), 2);

        // The suspended item was released, not left leased
        let next = queue.claim_item(None).await.unwrap().unwrap();
        assert_eq!(next.data, json!(1));
    }

    #[tokio::test]
    async fn test_unexpected_failure_leaves_item_claimed() {
        let queue = queue();
        queue.create_item(json!(1)).await.unwrap();
        queue.create_item(json!(2)).await.unwrap();
        let drainer =
            EndOfCycleDrainer::new(queue.clone(), Arc::new(ScriptedWorker::new([Step::Fail])));

        let report = drainer.drain().await.unwrap();
        assert_eq!(report.outcome, DrainOutcome::Drained);
        assert_eq!(report.failed, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(queue.number_of_items().await.unwrap(), 1);
        assert!(queue.claim_item(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_items_enqueued_during_drain_are_drained() {
        let queue = queue();
        queue.create_item(json!("parent")).await.unwrap();
        let mut worker = ScriptedWorker::succeeding();
        worker.spawn_into = Some(queue.clone());
        let worker = Arc::new(worker);
        let drainer = EndOfCycleDrainer::new(queue.clone(), worker.clone());

        let report = drainer.drain().await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(*worker.seen.lock().await, vec![json!("parent"), json!("child")]);
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let queue = queue();
        queue.create_item(json!("task")).await.unwrap();
        let worker = ScriptedWorker::new(std::iter::repeat_n(Step::Requeue, 100));
        let drainer = EndOfCycleDrainer::new(queue.clone(), Arc::new(worker))
            .with_limits(DrainLimits::unbounded().with_max_iterations(5));

        let report = drainer.drain().await.unwrap();
        assert_eq!(report.outcome, DrainOutcome::LimitReached);
        assert_eq!(report.claimed, 5);
        assert_eq!(report.requeued, 5);
        assert_eq!(queue.number_of_items().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_time_budget() {
        let queue = queue();
        queue.create_item(json!("task")).await.unwrap();
        let drainer = EndOfCycleDrainer::new(queue.clone(), Arc::new(ScriptedWorker::succeeding()))
            .with_limits(DrainLimits::unbounded().with_time_budget(Duration::ZERO));

        let report = drainer.drain().await.unwrap();
        assert_eq!(report.outcome, DrainOutcome::LimitReached);
        assert_eq!(report.claimed, 0);
        assert_eq!(queue.number_of_items().await.unwrap(), 1);
    }

    #[test]
    fn test_report_serialization() {
        let report = DrainReport::new(Uuid::nil());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["outcome"], json!("drained"));
        assert_eq!(value["claimed"], json!(0));
    }

    #[test]
    fn test_fault_category() {
        let storage = anyhow::Error::new(StorageError::entity_not_found(ctw_core::EntityId(4)));
        assert_eq!(fault_category(&storage), "not_found");
        assert_eq!(fault_category(&anyhow::anyhow!("boom")), "other");
    }
}
