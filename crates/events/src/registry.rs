//! Process-wide job table.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use slidecast_core::error::CoreError;
use slidecast_core::event::SequencedEvent;
use slidecast_core::types::JobId;
use tokio::sync::mpsc;

use crate::record::{JobRecord, JobSnapshot};

/// Table of every job created since process start.
///
/// Entries are never removed. Lookups take a short read lock on the table;
/// all per-job mutation goes through the job's own [`JobSlot`] lock, so
/// jobs never contend with each other beyond the table lookup.
pub struct JobRegistry {
    inner: RwLock<RegistryInner>,
    /// Backlog retention applied to every new record.
    retention: Option<usize>,
}

#[derive(Default)]
struct RegistryInner {
    jobs: HashMap<JobId, Arc<JobSlot>>,
    /// Creation order, oldest first.
    order: Vec<JobId>,
}

/// Lock-protected state for one job: its record and its live observers.
pub(crate) struct JobSlot {
    state: Mutex<JobState>,
    /// Set once the single publisher for this job has been handed out.
    pub(crate) publisher_claimed: AtomicBool,
}

pub(crate) struct JobState {
    pub(crate) record: JobRecord,
    pub(crate) observers: HashMap<u64, mpsc::Sender<SequencedEvent>>,
    pub(crate) next_observer: u64,
}

impl JobSlot {
    fn new(record: JobRecord) -> Self {
        Self {
            state: Mutex::new(JobState {
                record,
                observers: HashMap::new(),
                next_observer: 0,
            }),
            publisher_claimed: AtomicBool::new(false),
        }
    }

    /// Lock the job state. Critical sections never await, so a poisoned
    /// lock still holds consistent data and is recovered.
    pub(crate) fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobRegistry {
    /// Create an empty registry. `retention` caps each job's backlog
    /// (`None` or `Some(0)` keeps everything).
    pub fn new(retention: Option<usize>) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            retention: retention.filter(|n| *n > 0),
        }
    }

    /// Allocate a new `queued` job and return its id.
    pub fn create(&self, mode: &str) -> JobId {
        let id = JobId::new();
        let slot = Arc::new(JobSlot::new(JobRecord::new(id, mode, self.retention)));

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.jobs.insert(id, slot);
        inner.order.push(id);
        drop(inner);

        tracing::debug!(job_id = %id, mode, "Job record created");
        id
    }

    /// Snapshot of a job's current state.
    pub fn get(&self, id: &JobId) -> Result<JobSnapshot, CoreError> {
        let slot = self.slot(id)?;
        let state = slot.lock();
        Ok(state.record.snapshot())
    }

    /// Most recently created ids, newest first, at most `limit`.
    pub fn list_recent(&self, limit: usize) -> Vec<JobId> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.order.iter().rev().take(limit).copied().collect()
    }

    /// Number of jobs ever created.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of jobs that have not reached a terminal status.
    pub fn active_count(&self) -> usize {
        let slots: Vec<Arc<JobSlot>> = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            inner.jobs.values().cloned().collect()
        };
        slots
            .iter()
            .filter(|slot| !slot.lock().record.is_terminal())
            .count()
    }

    pub(crate) fn slot(&self, id: &JobId) -> Result<Arc<JobSlot>, CoreError> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::job_not_found(id))
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}
