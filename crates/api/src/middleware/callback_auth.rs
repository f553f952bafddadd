//! Shared-secret extractor for runner callbacks.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use pixeltrace_core::callback::CALLBACK_SECRET_HEADER;
use pixeltrace_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Proof that a request carried the configured callback secret.
///
/// Runs on the request head, so a bad secret is rejected before the body
/// is read. Always succeeds when no secret is configured.
///
/// ```ignore
/// async fn callback(_auth: CallbackAuth, Json(body): Json<CallbackPayload>) { .. }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CallbackAuth;

impl FromRequestParts<AppState> for CallbackAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(CALLBACK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());

        if !state.authenticator.verify(presented) {
            tracing::warn!(
                secret_present = presented.is_some(),
                "Rejected callback with invalid secret",
            );
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid or missing callback secret".into(),
            )));
        }

        Ok(CallbackAuth)
    }
}
