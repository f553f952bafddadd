pub mod callback;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /submit                 submit a job (POST)
/// /status/{job_id}        poll a job (GET)
/// /callback               runner result (POST, shared secret)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(jobs::router())
        .merge(callback::router())
}
