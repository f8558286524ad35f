//! The state container for a single job.

use std::collections::VecDeque;

use serde::Serialize;
use slidecast_core::event::{EventKind, JobEvent, PaperInfo, SequencedEvent, TokenUsage};
use slidecast_core::status::JobStatus;
use slidecast_core::types::{JobId, Timestamp};

/// Why an event was refused by a [`JobRecord`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("job already finished with status {0}")]
    Closed(JobStatus),

    #[error("status cannot move from {from} to {to}")]
    BackwardTransition { from: JobStatus, to: JobStatus },

    #[error("a paper event was already recorded for this job")]
    DuplicatePaper,
}

/// Mutable state of one pipeline run.
///
/// Only the event bus mutates a record, and only through [`append`](Self::append),
/// which enforces the lifecycle rules:
///
/// - status snapshots never move backwards (`queued < running < terminal`);
/// - nothing is accepted after a terminal status;
/// - at most one `paper` event is recorded.
#[derive(Debug)]
pub struct JobRecord {
    id: JobId,
    mode: String,
    status: JobStatus,
    progress: f64,
    message: String,
    result: Option<serde_json::Value>,
    paper: Option<SequencedEvent>,
    tokens: Option<TokenUsage>,
    backlog: VecDeque<SequencedEvent>,
    next_seq: u64,
    /// Keep only the newest N backlog entries; `None` keeps everything.
    retention: Option<usize>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

/// Point-in-time view of a record, without its backlog.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub mode: String,
    pub status: JobStatus,
    pub progress: f64,
    pub message: String,
    pub result: Option<serde_json::Value>,
    pub paper: Option<PaperInfo>,
    pub tokens: Option<TokenUsage>,
    /// Number of events ever published for the job.
    pub event_count: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// A fresh `queued` record with an empty backlog.
    pub fn new(id: JobId, mode: impl Into<String>, retention: Option<usize>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            mode: mode.into(),
            status: JobStatus::Queued,
            progress: 0.0,
            message: "Queued".to_string(),
            result: None,
            paper: None,
            tokens: None,
            backlog: VecDeque::new(),
            next_seq: 0,
            retention: retention.filter(|n| *n > 0),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The recorded `paper` event, if one was published.
    pub fn paper_event(&self) -> Option<&SequencedEvent> {
        self.paper.as_ref()
    }

    /// Total number of events ever appended (the next sequence number).
    pub fn event_count(&self) -> u64 {
        self.next_seq
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let paper = self.paper.as_ref().and_then(|entry| match &entry.event {
            JobEvent::Paper(info) => Some(info.clone()),
            _ => None,
        });
        JobSnapshot {
            job_id: self.id,
            mode: self.mode.clone(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            result: self.result.clone(),
            paper,
            tokens: self.tokens.clone(),
            event_count: self.next_seq,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Check whether `event` may be appended without mutating anything.
    pub fn check(&self, event: &JobEvent) -> Result<(), Rejection> {
        if self.status.is_terminal() {
            return Err(Rejection::Closed(self.status));
        }
        match event {
            JobEvent::Status { status, .. } if !self.status.can_transition_to(*status) => {
                Err(Rejection::BackwardTransition {
                    from: self.status,
                    to: *status,
                })
            }
            JobEvent::Paper(_) if self.paper.is_some() => Err(Rejection::DuplicatePaper),
            _ => Ok(()),
        }
    }

    /// Apply `event` to the record state and append it to the backlog.
    ///
    /// Returns the sequenced entry on success.
    pub fn append(&mut self, event: JobEvent) -> Result<SequencedEvent, Rejection> {
        self.check(&event)?;

        match &event {
            JobEvent::Status {
                status,
                progress,
                message,
                result,
            } => {
                self.status = *status;
                self.progress = *progress;
                if let Some(message) = message {
                    self.message = message.clone();
                }
                if result.is_some() {
                    self.result = result.clone();
                }
            }
            JobEvent::Progress { progress, .. } => {
                self.progress = *progress;
            }
            JobEvent::Token(usage) => {
                self.tokens = Some(usage.clone());
            }
            JobEvent::Log { .. } | JobEvent::Paper(_) => {}
        }

        let entry = SequencedEvent {
            seq: self.next_seq,
            event,
        };
        self.next_seq += 1;
        self.updated_at = chrono::Utc::now();

        if matches!(entry.event, JobEvent::Paper(_)) {
            self.paper = Some(entry.clone());
        }

        self.backlog.push_back(entry.clone());
        if let Some(max) = self.retention {
            while self.backlog.len() > max {
                self.backlog.pop_front();
            }
        }

        Ok(entry)
    }

    /// The newest `limit` backlog entries in original order.
    ///
    /// With `kind` set, only entries of that kind are considered, and the
    /// newest `limit` of those are returned.
    pub fn tail(&self, limit: usize, kind: Option<EventKind>) -> Vec<SequencedEvent> {
        match kind {
            None => {
                let skip = self.backlog.len().saturating_sub(limit);
                self.backlog.iter().skip(skip).cloned().collect()
            }
            Some(kind) => {
                let mut picked: Vec<SequencedEvent> = self
                    .backlog
                    .iter()
                    .rev()
                    .filter(|entry| entry.event.kind() == kind)
                    .take(limit)
                    .cloned()
                    .collect();
                picked.reverse();
                picked
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use slidecast_core::event::PaperInfo;

    use super::*;

    fn record() -> JobRecord {
        JobRecord::new(JobId::new(), "demo", None)
    }

    fn paper() -> JobEvent {
        JobEvent::Paper(PaperInfo {
            id: "1706.03762".into(),
            title: "Attention Is All You Need".into(),
            url: None,
            authors: vec![],
        })
    }

    #[test]
    fn new_record_is_queued_and_empty() {
        let rec = record();
        assert_eq!(rec.status(), JobStatus::Queued);
        assert_eq!(rec.progress(), 0.0);
        assert_eq!(rec.event_count(), 0);
        assert!(rec.tail(10, None).is_empty());
    }

    #[test]
    fn append_assigns_consecutive_sequence_numbers() {
        let mut rec = record();
        for i in 0..3 {
            let entry = rec.append(JobEvent::log(format!("line {i}"))).unwrap();
            assert_eq!(entry.seq, i);
        }
        assert_eq!(rec.event_count(), 3);
    }

    #[test]
    fn status_event_updates_snapshot() {
        let mut rec = record();
        rec.append(JobEvent::status(JobStatus::Running, 0.1, Some("go".into())))
            .unwrap();
        rec.append(JobEvent::progress(0.4, Some("slides".into())))
            .unwrap();

        let snap = rec.snapshot();
        assert_eq!(snap.status, JobStatus::Running);
        assert!((snap.progress - 0.4).abs() < f64::EPSILON);
        assert_eq!(snap.message, "go");
        assert_eq!(snap.event_count, 2);
    }

    #[test]
    fn terminal_status_closes_the_record() {
        let mut rec = record();
        rec.append(JobEvent::status(JobStatus::Running, 0.0, None))
            .unwrap();
        rec.append(JobEvent::Status {
            status: JobStatus::Succeeded,
            progress: 1.0,
            message: None,
            result: Some(serde_json::json!({"video": "out.mp4"})),
        })
        .unwrap();

        assert!(rec.is_terminal());
        assert_matches!(
            rec.append(JobEvent::log("late")),
            Err(Rejection::Closed(JobStatus::Succeeded))
        );
        assert_matches!(
            rec.append(JobEvent::status(JobStatus::Failed, 1.0, None)),
            Err(Rejection::Closed(_))
        );
        assert_eq!(rec.snapshot().result.unwrap()["video"], "out.mp4");
        assert_eq!(rec.event_count(), 2);
    }

    #[test]
    fn backward_status_is_rejected() {
        let mut rec = record();
        rec.append(JobEvent::status(JobStatus::Running, 0.0, None))
            .unwrap();
        assert_matches!(
            rec.append(JobEvent::status(JobStatus::Queued, 0.0, None)),
            Err(Rejection::BackwardTransition { .. })
        );
        assert_eq!(rec.status(), JobStatus::Running);
    }

    #[test]
    fn second_paper_is_rejected() {
        let mut rec = record();
        let first = rec.append(paper()).unwrap();
        assert_matches!(rec.append(paper()), Err(Rejection::DuplicatePaper));
        assert_eq!(rec.paper_event(), Some(&first));
        assert_eq!(rec.snapshot().paper.unwrap().id, "1706.03762");
    }

    #[test]
    fn tail_returns_newest_entries_in_order() {
        let mut rec = record();
        for i in 0..500 {
            rec.append(JobEvent::log(format!("line {i}"))).unwrap();
        }
        let tail = rec.tail(200, None);
        assert_eq!(tail.len(), 200);
        assert_eq!(tail.first().unwrap().seq, 300);
        assert_eq!(tail.last().unwrap().seq, 499);
        assert!(tail.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
    }

    #[test]
    fn tail_filters_by_kind() {
        let mut rec = record();
        rec.append(JobEvent::log("a")).unwrap();
        rec.append(JobEvent::progress(0.1, None)).unwrap();
        rec.append(JobEvent::log("b")).unwrap();
        rec.append(JobEvent::progress(0.2, None)).unwrap();
        rec.append(JobEvent::log("c")).unwrap();

        let logs = rec.tail(2, Some(EventKind::Log));
        let seqs: Vec<u64> = logs.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![2, 4]);
    }

    #[test]
    fn retention_keeps_newest_entries_but_sequence_continues() {
        let mut rec = JobRecord::new(JobId::new(), "demo", Some(3));
        for i in 0..10 {
            rec.append(JobEvent::log(format!("{i}"))).unwrap();
        }
        let tail = rec.tail(100, None);
        let seqs: Vec<u64> = tail.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![7, 8, 9]);
        assert_eq!(rec.event_count(), 10);
    }

    #[test]
    fn zero_retention_means_unbounded() {
        let mut rec = JobRecord::new(JobId::new(), "demo", Some(0));
        for _ in 0..5 {
            rec.append(JobEvent::log("x")).unwrap();
        }
        assert_eq!(rec.tail(100, None).len(), 5);
    }
}
