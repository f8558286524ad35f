//! Job state and live event fan-out.
//!
//! - [`JobRecord`] — mutable state of one pipeline run plus its ordered
//!   event backlog.
//! - [`JobRegistry`] — process-wide table of records, created once at
//!   startup and shared via `Arc`.
//! - [`EventBus`] — per-job publish/subscribe on top of the registry.
//!   Appending to a backlog and fanning out to observers happen under the
//!   same lock, so a replay snapshot followed by a live subscription never
//!   skips or repeats an event.

pub mod bus;
pub mod record;
pub mod registry;

pub use bus::{Attachment, EventBus, JobPublisher, ObserverHandle, Subscription};
pub use record::{JobRecord, JobSnapshot, Rejection};
pub use registry::JobRegistry;
