//! Handlers for job submission and status polling.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use pixeltrace_core::job::{Job, JobState};
use pixeltrace_core::submission::SubmitRequest;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

/// Response body of a successful submit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub ok: bool,
    pub job_id: String,
    pub state: JobState,
}

/// POST /api/v1/submit
///
/// Accepts `{folderId, eventName, ownerId?, jobId?}`. Returns 200 with the
/// job's state after the provider call, which is `failed` if the provider
/// rejected it. 400 on invalid input, 409 if the id already exists.
pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> AppResult<Json<SubmitResponse>> {
    let Json(request) = body?;
    let job = state.dispatcher.submit(&request).await?;

    Ok(Json(SubmitResponse {
        ok: true,
        job_id: job.id,
        state: job.state,
    }))
}

/// GET /api/v1/status/{job_id}
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<Job>> {
    let job = state.status.get(&job_id).await?;
    Ok(Json(job))
}
