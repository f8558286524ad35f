//! Shared response envelope types for API handlers.
//!
//! Every JSON response except `/health` and errors uses a `{ "data": ... }`
//! envelope.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: job_ids }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
