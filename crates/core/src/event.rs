//! Events describing the progress and outcome of one job.
//!
//! A [`JobEvent`] is immutable once published. Its position in the job's
//! backlog is its sequence number; see [`SequencedEvent`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job_events::{
    MSG_TYPE_LOG, MSG_TYPE_PAPER, MSG_TYPE_PROGRESS, MSG_TYPE_STATUS, MSG_TYPE_TOKEN,
};
use crate::status::JobStatus;
use crate::types::clamp_progress;

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// Metadata about the paper a job is working on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperInfo {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

/// Accumulated resource usage for a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Total tokens across all agents.
    pub total: u64,
    /// Estimated total cost in USD.
    pub cost: f64,
    /// Tokens broken down by the agent that consumed them.
    pub by_agent: BTreeMap<String, u64>,
}

impl TokenUsage {
    /// Add one agent's consumption to the ledger.
    pub fn record(&mut self, agent: &str, tokens: u64, cost: f64) {
        self.total += tokens;
        self.cost += cost;
        *self.by_agent.entry(agent.to_string()).or_insert(0) += tokens;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0 && self.cost == 0.0
    }
}

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// One unit of observable information about a job.
///
/// Serialized with a `type` discriminator, e.g.
/// `{"type":"log","message":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Log {
        message: String,
        /// Pipeline stage the line belongs to, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
        /// Provider that produced (or failed to produce) an output.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },
    Status {
        status: JobStatus,
        progress: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },
    Progress {
        progress: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
    },
    Paper(PaperInfo),
    Token(TokenUsage),
}

impl JobEvent {
    /// A plain log line.
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            stage: None,
            provider: None,
        }
    }

    /// A log line attributed to a pipeline stage.
    pub fn stage_log(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
            stage: Some(stage.into()),
            provider: None,
        }
    }

    /// A log line reporting a provider outcome within a stage.
    pub fn provider_log(
        stage: impl Into<String>,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Log {
            message: message.into(),
            stage: Some(stage.into()),
            provider: Some(provider.into()),
        }
    }

    /// A status snapshot. `progress` is clamped into `0.0..=1.0`.
    pub fn status(status: JobStatus, progress: f64, message: Option<String>) -> Self {
        Self::Status {
            status,
            progress: clamp_progress(progress),
            message,
            result: None,
        }
    }

    /// A progress tick. `progress` is clamped into `0.0..=1.0`.
    pub fn progress(progress: f64, stage: Option<String>) -> Self {
        Self::Progress {
            progress: clamp_progress(progress),
            stage,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Log { .. } => EventKind::Log,
            Self::Status { .. } => EventKind::Status,
            Self::Progress { .. } => EventKind::Progress,
            Self::Paper(_) => EventKind::Paper,
            Self::Token(_) => EventKind::Token,
        }
    }

    /// The progress value carried by this event, if any.
    pub fn progress_value(&self) -> Option<f64> {
        match self {
            Self::Status { progress, .. } | Self::Progress { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    /// The status carried by this event, if it is a status snapshot.
    pub fn status_value(&self) -> Option<JobStatus> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this event ends the job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        self.status_value().is_some_and(JobStatus::is_terminal)
    }
}

/// An event together with its position in the job backlog.
///
/// Serializes flat: `{"seq":3,"type":"log","message":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub event: JobEvent,
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Discriminator of a [`JobEvent`], used for filtering backlogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Log,
    Status,
    Progress,
    Paper,
    Token,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => MSG_TYPE_LOG,
            Self::Status => MSG_TYPE_STATUS,
            Self::Progress => MSG_TYPE_PROGRESS,
            Self::Paper => MSG_TYPE_PAPER,
            Self::Token => MSG_TYPE_TOKEN,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MSG_TYPE_LOG => Ok(Self::Log),
            MSG_TYPE_STATUS => Ok(Self::Status),
            MSG_TYPE_PROGRESS => Ok(Self::Progress),
            MSG_TYPE_PAPER => Ok(Self::Paper),
            MSG_TYPE_TOKEN => Ok(Self::Token),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}
