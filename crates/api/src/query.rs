//! Query parameter types for the job endpoints.

use serde::Deserialize;

/// Default number of ids returned by `GET /jobs`.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Largest page `GET /jobs` will return.
pub const MAX_LIST_LIMIT: usize = 100;

/// `?limit=` for `GET /jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsParams {
    pub limit: Option<usize>,
}

impl ListJobsParams {
    /// Requested page size capped at [`MAX_LIST_LIMIT`]. Zero yields an
    /// empty page.
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT)
    }
}

/// `?limit=&kind=` for `GET /jobs/{id}/logs`.
///
/// `kind` restricts the tail to one event type (`log`, `status`, ...).
#[derive(Debug, Default, Deserialize)]
pub struct LogsParams {
    pub limit: Option<usize>,
    pub kind: Option<String>,
}

/// `?limit=` for the live stream: how much backlog to replay on attach.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    pub limit: Option<usize>,
}
