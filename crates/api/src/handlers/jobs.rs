//! Handlers for the `/jobs` resource.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use slidecast_core::error::CoreError;
use slidecast_core::event::EventKind;
use slidecast_core::request::JobRequest;
use slidecast_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::query::{ListJobsParams, LogsParams};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a job id from the path. Malformed ids are reported as unknown.
pub fn parse_job_id(raw: &str) -> AppResult<JobId> {
    JobId::parse(raw).ok_or_else(|| AppError::Core(CoreError::job_not_found(raw)))
}

#[derive(Debug, Serialize)]
pub struct CreatedJob {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct CancelAccepted {
    pub job_id: JobId,
    pub cancelling: bool,
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create a job and start its pipeline. Returns 201 with the new id; the
/// run continues in the background.
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(request) = payload?;
    let job_id = state.dispatcher.submit(request)?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedJob { job_id },
        }),
    ))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Ids of the most recently created jobs, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    params: Result<Query<ListJobsParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;
    let ids = state.bus.registry().list_recent(params.limit());
    Ok(Json(DataResponse { data: ids }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    let snapshot = state.bus.registry().get(&job_id)?;
    Ok(Json(DataResponse { data: snapshot }))
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/logs
///
/// The newest `limit` backlog events in original order, optionally only
/// those of one `kind`. Without a kind this is exactly what a live
/// connection replays on attach for the same `limit`.
pub async fn get_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<LogsParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    let Query(params) = params?;
    let kind = params
        .kind
        .as_deref()
        .map(str::parse::<EventKind>)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let limit = state.config.replay_limit(params.limit);
    let events = state.bus.replay_kind(&job_id, limit, kind)?;
    Ok(Json(DataResponse { data: events }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/cancel
///
/// Returns 202 once cancellation was requested, 409 if the job already
/// finished. The terminal `cancelled` status follows on the event stream.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    state.dispatcher.cancel(&job_id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: CancelAccepted {
                job_id,
                cancelling: true,
            },
        }),
    ))
}
