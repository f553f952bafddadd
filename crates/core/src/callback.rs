//! Callback payload sent by the job runner when an indexing job finishes.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lifecycle::CallbackOutcome;
use crate::submission::check_identifier;
use crate::types::JobId;

/// Header carrying the pre-shared callback secret.
pub const CALLBACK_SECRET_HEADER: &str = "x-callback-secret";

/// Body of `POST /callback`.
///
/// `manifest` is opaque: only its presence is ever inspected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    #[serde(default, alias = "jobId", alias = "event_id", alias = "job_id")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<serde_json::Value>,
}

impl CallbackPayload {
    /// Split into the job id and the outcome the coordinator applies.
    pub fn into_outcome(self) -> Result<(JobId, CallbackOutcome), CoreError> {
        let id = self
            .event_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CoreError::Validation("eventId is required".into()))?
            .to_string();
        check_identifier("eventId", &id)?;

        let owner_id = self
            .owner_id
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty());

        Ok((
            id,
            CallbackOutcome {
                manifest: self.manifest,
                is_error: self.error,
                error: self.error_message,
                owner_id,
            },
        ))
    }
}
