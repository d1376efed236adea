use std::sync::Arc;

use ctw_db_memory::{create_queue, create_storage};
use ctw_storage::{DynQueue, DynStorage, EnqueuingStorage, StorageError};
use tracing::info;

use crate::config::{ConfigError, WorkflowConfig};
use crate::cycle::{CycleTeardown, TeardownReport};
use crate::drain::{DrainReport, EndOfCycleDrainer};
use crate::observability;
use crate::reconcile::ForwardRevisionReconciler;

/// The store every caller should save through: saves that move a
/// translation's moderation state enqueue a reconciliation task.
pub type WorkflowStorage = Arc<EnqueuingStorage<DynStorage>>;

/// Wires the store, the queue, the reconciler and the end-of-cycle drain.
pub struct Workflow {
    config: WorkflowConfig,
    storage: WorkflowStorage,
    queue: DynQueue,
    reconciler: Arc<ForwardRevisionReconciler<WorkflowStorage>>,
    drainer: Arc<EndOfCycleDrainer>,
    teardown: Arc<CycleTeardown>,
}

impl Workflow {
    /// Builds a workflow on the backend named in `config` and sets up
    /// tracing at the configured level.
    pub async fn from_config(config: WorkflowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        observability::init_tracing(&config.logging);

        let storage = create_storage(config.storage.backend);
        let queue = create_queue(config.storage.backend, &config.queue.name);
        Self::with_backends(config, storage, queue).await
    }

    /// Builds a workflow on caller-provided backends.
    pub async fn with_backends(
        config: WorkflowConfig,
        storage: DynStorage,
        queue: DynQueue,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let storage = Arc::new(EnqueuingStorage::new(storage, queue.clone()));
        let reconciler = Arc::new(
            ForwardRevisionReconciler::new(storage.clone())
                .with_lease_time(config.queue.lease_time()),
        );
        let drainer = Arc::new(
            EndOfCycleDrainer::new(queue.clone(), reconciler.clone())
                .with_limits(config.drain.limits()),
        );
        let teardown = Arc::new(CycleTeardown::new());
        teardown.subscribe(drainer.clone()).await;

        info!(
            backend = %config.storage.backend,
            queue = %config.queue.name,
            max_iterations = ?config.drain.max_iterations,
            time_budget_ms = ?config.drain.time_budget_ms,
            "Content translation workflow ready"
        );

        Ok(Self {
            config,
            storage,
            queue,
            reconciler,
            drainer,
            teardown,
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn storage(&self) -> &WorkflowStorage {
        &self.storage
    }

    pub fn queue(&self) -> &DynQueue {
        &self.queue
    }

    pub fn reconciler(&self) -> &ForwardRevisionReconciler<WorkflowStorage> {
        &self.reconciler
    }

    pub fn drainer(&self) -> &EndOfCycleDrainer {
        &self.drainer
    }

    /// The registry to hang further end-of-cycle work on.
    pub fn teardown(&self) -> &CycleTeardown {
        &self.teardown
    }

    /// Drains the reconciliation queue outside of a teardown.
    pub async fn drain(&self) -> Result<DrainReport, StorageError> {
        self.drainer.drain().await
    }

    /// Signals the end of a processing cycle.
    pub async fn end_cycle(&self) -> TeardownReport {
        self.teardown.run().await
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("config", &self.config)
            .field("storage", &self.storage)
            .field("drainer", &self.drainer)
            .finish_non_exhaustive()
    }
}
