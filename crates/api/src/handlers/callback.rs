//! Handler for job runner callbacks.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use pixeltrace_core::callback::CallbackPayload;
use pixeltrace_core::job::JobState;
use pixeltrace_core::lifecycle::Outcome;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::callback_auth::CallbackAuth;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub ok: bool,
    pub job_id: String,
    pub state: JobState,
    /// The job was already terminal and this callback changed nothing.
    pub duplicate: bool,
}

/// POST /api/v1/callback
///
/// Requires `X-Callback-Secret` when a secret is configured (401 otherwise,
/// before the body is parsed). Duplicate callbacks return 200 so the runner
/// does not keep retrying.
pub async fn receive_callback(
    _auth: CallbackAuth,
    State(state): State<AppState>,
    body: Result<Json<CallbackPayload>, JsonRejection>,
) -> AppResult<Json<CallbackResponse>> {
    let Json(payload) = body?;
    let (job_id, outcome) = payload.into_outcome()?;

    let transition = state.coordinator.on_callback(&job_id, outcome).await?;

    Ok(Json(CallbackResponse {
        ok: true,
        job_id,
        state: transition.job.state,
        duplicate: matches!(transition.outcome, Outcome::Duplicate { .. }),
    }))
}
