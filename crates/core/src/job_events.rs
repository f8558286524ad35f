//! Wire-level type discriminators for job stream messages.
//!
//! Every message pushed to an observer carries a `type` field equal to one
//! of the `MSG_TYPE_*` constants. `CLIENT_MSG_*` are the messages an
//! observer may send back over the live connection.

/// A human-readable log line.
pub const MSG_TYPE_LOG: &str = "log";

/// Full job state snapshot (status, progress, optional message/result).
pub const MSG_TYPE_STATUS: &str = "status";

/// Fine-grained progress tick between status snapshots.
pub const MSG_TYPE_PROGRESS: &str = "progress";

/// Paper metadata discovered while fetching.
pub const MSG_TYPE_PAPER: &str = "paper";

/// Token / cost accounting snapshot.
pub const MSG_TYPE_TOKEN: &str = "token";

/// Client request to re-deliver the recorded paper event.
pub const CLIENT_MSG_REPLAY_PAPER: &str = "replay_paper";

/// Close reason sent when an observer falls too far behind.
pub const CLOSE_REASON_LAGGED: &str = "lagged";
