//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> create_job
/// GET    /{id}            -> get_job
/// GET    /{id}/logs       -> get_logs
/// POST   /{id}/cancel     -> cancel_job
/// GET    /{id}/ws         -> job_stream
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/logs", get(jobs::get_logs))
        .route("/{id}/cancel", post(jobs::cancel_job))
        .route("/{id}/ws", get(ws::job_stream))
}
