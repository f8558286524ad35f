pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                        list, create
/// /jobs/{id}                   status snapshot
/// /jobs/{id}/logs              backlog tail (?limit=&kind=)
/// /jobs/{id}/cancel            cooperative cancel (POST)
/// /jobs/{id}/ws                live event stream (WebSocket, ?limit=)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}
