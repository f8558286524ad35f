use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque identifier of one pipeline run.
///
/// Backed by a UUIDv7 so ids roughly sort by creation time. The string form is
/// the hyphen-less hex encoding, which is safe to embed in URL paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct JobId(Uuid);

impl JobId {
    /// Allocate a fresh, time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse an id from its string form, returning `None` when malformed.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::try_parse(raw.trim()).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for JobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid job id: {s}"))
    }
}

impl From<JobId> for String {
    fn from(value: JobId) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for JobId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Clamp a raw progress value into `0.0..=1.0`, mapping NaN to zero.
pub fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_round_trips_through_display() {
        let id = JobId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(JobId::parse(&text), Some(id));
    }

    #[test]
    fn job_id_accepts_hyphenated_form() {
        let id = JobId::new();
        let hyphenated = id.0.hyphenated().to_string();
        assert_eq!(JobId::parse(&hyphenated), Some(id));
    }

    #[test]
    fn job_id_rejects_garbage() {
        assert!(JobId::parse("not-a-job").is_none());
        assert!(JobId::parse("").is_none());
        assert!("../etc/passwd".parse::<JobId>().is_err());
    }

    #[test]
    fn clamp_progress_bounds() {
        assert_eq!(clamp_progress(-0.5), 0.0);
        assert_eq!(clamp_progress(1.5), 1.0);
        assert_eq!(clamp_progress(f64::NAN), 0.0);
        assert!((clamp_progress(0.25) - 0.25).abs() < f64::EPSILON);
    }
}
