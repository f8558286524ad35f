//! Job dispatcher.
//!
//! Every accepted request gets a registry record, the job's single
//! publisher and one tokio task running the pipeline. Each task holds a
//! child of the dispatcher's shutdown token, so shutting down cancels every
//! running job at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use slidecast_core::error::CoreError;
use slidecast_core::request::JobRequest;
use slidecast_core::types::JobId;
use slidecast_events::EventBus;
use slidecast_pipeline::PipelineRunner;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::AppResult;

type RunningJobs = Arc<Mutex<HashMap<JobId, CancellationToken>>>;

pub struct JobDispatcher {
    bus: EventBus,
    runner: PipelineRunner,
    running: RunningJobs,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl JobDispatcher {
    pub fn new(bus: EventBus, runner: PipelineRunner) -> Self {
        Self {
            bus,
            runner,
            running: Arc::new(Mutex::new(HashMap::new())),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Validate `request`, create its job and start the runner task.
    ///
    /// Returns as soon as the job is registered; the run continues in the
    /// background.
    pub fn submit(&self, request: JobRequest) -> AppResult<JobId> {
        request.validate()?;
        self.runner.validate(&request)?;
        if self.shutdown.is_cancelled() {
            return Err(CoreError::Conflict("server is shutting down".to_string()).into());
        }

        let mode = request.mode.name();
        let job_id = self.bus.registry().create(mode);
        let publisher = self.bus.claim_publisher(&job_id)?;
        let cancel = self.shutdown.child_token();
        lock(&self.running).insert(job_id, cancel.clone());

        let runner = self.runner.clone();
        let running = Arc::clone(&self.running);
        self.tracker.spawn(async move {
            let status = runner.run(publisher, request, cancel).await;
            lock(&running).remove(&job_id);
            tracing::info!(job_id = %job_id, %status, "Job finished");
        });

        tracing::info!(job_id = %job_id, mode, "Job submitted");
        Ok(job_id)
    }

    /// Request cooperative cancellation of a running job.
    ///
    /// `NotFound` for unknown ids, `Conflict` once the job is terminal.
    pub fn cancel(&self, id: &JobId) -> AppResult<()> {
        let snapshot = self.bus.registry().get(id)?;
        if snapshot.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "job {id} is already {} and cannot be cancelled",
                snapshot.status
            ))
            .into());
        }

        match lock(&self.running).get(id) {
            Some(token) => {
                token.cancel();
                tracing::info!(job_id = %id, "Job cancellation requested");
                Ok(())
            }
            None => Err(CoreError::Conflict(format!("job {id} is not running")).into()),
        }
    }

    /// Number of runner tasks that have not finished yet.
    pub fn running_count(&self) -> usize {
        lock(&self.running).len()
    }

    /// Cancel every running job and wait up to `timeout` for the runners to
    /// publish their final status. New submissions are refused afterwards.
    pub async fn shutdown(&self, timeout: Duration) {
        self.shutdown.cancel();
        self.tracker.close();
        let pending = self.tracker.len();
        tracing::info!(pending, "Cancelling running jobs");

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                pending = self.tracker.len(),
                timeout_secs = timeout.as_secs(),
                "Runners still active after shutdown timeout",
            );
        } else {
            tracing::info!("All runners stopped");
        }
    }
}

fn lock(running: &Mutex<HashMap<JobId, CancellationToken>>) -> MutexGuard<'_, HashMap<JobId, CancellationToken>> {
    running.lock().unwrap_or_else(PoisonError::into_inner)
}
