//! Per-job publish/subscribe on top of the [`JobRegistry`].
//!
//! Every job has its own observer set living next to its record inside the
//! job's slot lock. [`JobPublisher::publish`] appends to the backlog and
//! pushes to each observer's bounded queue under that lock, and
//! [`EventBus::attach`] snapshots the backlog and registers the observer
//! under the same lock. That is what makes replay-then-subscribe gap-free
//! and duplicate-free.
//!
//! Delivery never waits: a full observer queue means the observer has
//! fallen behind, so it is dropped and its stream ends. The caller is
//! expected to reconnect and replay.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use slidecast_core::error::CoreError;
use slidecast_core::event::{EventKind, JobEvent, SequencedEvent};
use slidecast_core::status::JobStatus;
use slidecast_core::types::JobId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::registry::{JobRegistry, JobSlot};

/// Default capacity of each observer's outbound queue.
pub const DEFAULT_OBSERVER_CAPACITY: usize = 512;

/// Message of the terminal status published when a publisher is dropped
/// before the job finished.
const ABANDONED_MESSAGE: &str = "Runner stopped without reporting an outcome";

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Cheaply cloneable handle to the process-wide bus.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<JobRegistry>,
    observer_capacity: usize,
}

impl EventBus {
    pub fn new(registry: Arc<JobRegistry>, observer_capacity: usize) -> Self {
        Self {
            registry,
            observer_capacity: observer_capacity.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Hand out the single publisher for `id`.
    ///
    /// A job has exactly one writer for its whole life; a second claim is a
    /// [`CoreError::Conflict`], even after the first publisher was dropped.
    pub fn claim_publisher(&self, id: &JobId) -> Result<JobPublisher, CoreError> {
        let slot = self.registry.slot(id)?;
        if slot.publisher_claimed.swap(true, Ordering::AcqRel) {
            return Err(CoreError::Conflict(format!(
                "job {id} already has a publisher"
            )));
        }
        Ok(JobPublisher {
            job_id: *id,
            slot,
            finished: false,
        })
    }

    /// Register a live observer for every event published from now on.
    pub fn subscribe(&self, id: &JobId) -> Result<Subscription, CoreError> {
        self.attach(id, 0).map(|attachment| attachment.subscription)
    }

    /// Snapshot the newest `limit` backlog entries and subscribe, atomically.
    ///
    /// The first live event the subscription yields is exactly the one
    /// following the last backlog entry returned.
    pub fn attach(&self, id: &JobId, limit: usize) -> Result<Attachment, CoreError> {
        let slot = self.registry.slot(id)?;
        let (tx, rx) = mpsc::channel(self.observer_capacity);

        let mut state = slot.lock();
        let backlog = state.record.tail(limit, None);
        let already_finished = state.record.is_terminal();
        let observer_id = state.next_observer;
        state.next_observer += 1;
        if already_finished {
            // Nothing will ever be published again; let the stream end.
            drop(tx);
        } else {
            state.observers.insert(observer_id, tx);
        }
        drop(state);

        tracing::debug!(
            job_id = %id,
            observer_id,
            replayed = backlog.len(),
            already_finished,
            "Observer attached",
        );

        Ok(Attachment {
            backlog,
            subscription: Subscription {
                handle: ObserverHandle {
                    job_id: *id,
                    observer_id,
                },
                receiver: rx,
                bus: self.clone(),
                finished: already_finished,
            },
        })
    }

    /// Remove an observer. Unknown or already removed handles are ignored.
    pub fn unsubscribe(&self, handle: &ObserverHandle) {
        let Ok(slot) = self.registry.slot(&handle.job_id) else {
            return;
        };
        let removed = slot.lock().observers.remove(&handle.observer_id).is_some();
        if removed {
            tracing::debug!(
                job_id = %handle.job_id,
                observer_id = handle.observer_id,
                "Observer detached",
            );
        }
    }

    /// The newest `limit` backlog entries in original order.
    pub fn replay(&self, id: &JobId, limit: usize) -> Result<Vec<SequencedEvent>, CoreError> {
        self.replay_kind(id, limit, None)
    }

    /// Like [`replay`](Self::replay), restricted to one event kind when
    /// `kind` is set.
    pub fn replay_kind(
        &self,
        id: &JobId,
        limit: usize,
        kind: Option<EventKind>,
    ) -> Result<Vec<SequencedEvent>, CoreError> {
        let slot = self.registry.slot(id)?;
        let state = slot.lock();
        Ok(state.record.tail(limit, kind))
    }

    /// The recorded `paper` event, if the job published one.
    pub fn paper_event(&self, id: &JobId) -> Result<Option<SequencedEvent>, CoreError> {
        let slot = self.registry.slot(id)?;
        let state = slot.lock();
        Ok(state.record.paper_event().cloned())
    }

    /// Number of observers currently attached to `id`.
    pub fn observer_count(&self, id: &JobId) -> Result<usize, CoreError> {
        let slot = self.registry.slot(id)?;
        let state = slot.lock();
        Ok(state.observers.len())
    }

    pub fn is_terminal(&self, id: &JobId) -> Result<bool, CoreError> {
        let slot = self.registry.slot(id)?;
        let state = slot.lock();
        Ok(state.record.is_terminal())
    }
}

// ---------------------------------------------------------------------------
// JobPublisher
// ---------------------------------------------------------------------------

/// The only writer for one job.
///
/// Dropping a publisher whose job has not reached a terminal status
/// publishes `failed`, so observers never wait on a job nobody drives.
pub struct JobPublisher {
    job_id: JobId,
    slot: Arc<JobSlot>,
    finished: bool,
}

impl std::fmt::Debug for JobPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPublisher")
            .field("job_id", &self.job_id)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl JobPublisher {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Append `event` to the backlog and deliver it to every observer.
    ///
    /// Returns the assigned sequence number, or `None` when the record
    /// refused the event (status regression, duplicate paper, or anything
    /// after the terminal status). Refusals and delivery problems are
    /// logged and never surface as errors.
    pub fn publish(&mut self, event: JobEvent) -> Option<u64> {
        let mut state = self.slot.lock();

        let entry = match state.record.append(event) {
            Ok(entry) => entry,
            Err(rejection) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    error = %rejection,
                    "Event rejected",
                );
                return None;
            }
        };

        let job_id = self.job_id;
        state
            .observers
            .retain(|observer_id, tx| match tx.try_send(entry.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        job_id = %job_id,
                        observer_id = *observer_id,
                        seq = entry.seq,
                        "Observer queue full, dropping observer",
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });

        if entry.event.is_terminal() {
            // Closing the senders ends every live stream after this event.
            state.observers.clear();
            self.finished = true;
        }

        Some(entry.seq)
    }

    /// Last known progress of the job.
    pub fn progress(&self) -> f64 {
        self.slot.lock().record.progress()
    }

    pub fn status(&self) -> JobStatus {
        self.slot.lock().record.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.finished || self.slot.lock().record.is_terminal()
    }
}

impl Drop for JobPublisher {
    fn drop(&mut self) {
        if self.is_terminal() {
            return;
        }
        tracing::error!(job_id = %self.job_id, "Publisher dropped before the job finished");
        let progress = self.progress();
        self.publish(JobEvent::status(
            JobStatus::Failed,
            progress,
            Some(ABANDONED_MESSAGE.to_string()),
        ));
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Identifies one observer of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle {
    pub job_id: JobId,
    pub observer_id: u64,
}

/// Result of [`EventBus::attach`]: the replayed prefix plus the live tail.
pub struct Attachment {
    pub backlog: Vec<SequencedEvent>,
    pub subscription: Subscription,
}

/// Live event stream for one observer.
///
/// The stream ends (`recv` yields `None`) after the terminal event, when
/// the observer was dropped for lagging, or after an explicit
/// [`unsubscribe`](Self::unsubscribe). [`finished`](Self::finished) tells
/// the first case apart from the others. Dropping the subscription
/// unsubscribes.
pub struct Subscription {
    handle: ObserverHandle,
    receiver: mpsc::Receiver<SequencedEvent>,
    bus: EventBus,
    finished: bool,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub fn handle(&self) -> ObserverHandle {
        self.handle
    }

    /// Wait for the next live event.
    pub async fn recv(&mut self) -> Option<SequencedEvent> {
        let entry = self.receiver.recv().await?;
        if entry.event.is_terminal() {
            self.finished = true;
        }
        Some(entry)
    }

    /// Take the next already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<SequencedEvent> {
        let entry = self.receiver.try_recv().ok()?;
        if entry.event.is_terminal() {
            self.finished = true;
        }
        Some(entry)
    }

    /// Whether the stream ended because the job reached a terminal status.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Stop live delivery. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        self.bus.unsubscribe(&self.handle);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.handle);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
