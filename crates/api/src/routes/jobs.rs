//! Route definitions for job submission and status.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes merged into `/api/v1`.
///
/// ```text
/// POST   /submit              -> submit
/// GET    /status/{job_id}     -> get_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/submit", post(jobs::submit))
        .route("/status/{job_id}", get(jobs::get_status))
}
