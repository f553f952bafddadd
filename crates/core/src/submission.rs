//! Validation for indexing job submissions.

use serde::Deserialize;

use crate::error::CoreError;
use crate::types::{JobId, PUBLIC_OWNER_ID};

/// Longest accepted identifier, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 256;

/// Body of `POST /submit`, as sent by clients.
///
/// Every field is optional at the serde level so that missing fields are
/// reported as validation errors rather than decode failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Overrides `event_name` as the job id.
    #[serde(default)]
    pub job_id: Option<String>,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub job_id: JobId,
    pub folder_id: String,
    pub event_name: String,
    pub owner_id: String,
}

impl SubmitRequest {
    /// Check required fields and apply defaults.
    pub fn validate(&self) -> Result<ValidSubmission, CoreError> {
        let folder_id = required("folderId", self.folder_id.as_deref())?;
        let event_name = required("eventName", self.event_name.as_deref())?;

        let job_id = match optional("jobId", self.job_id.as_deref())? {
            Some(id) => id,
            None => event_name.clone(),
        };
        let owner_id = optional("ownerId", self.owner_id.as_deref())?
            .unwrap_or_else(|| PUBLIC_OWNER_ID.to_string());

        Ok(ValidSubmission {
            job_id,
            folder_id,
            event_name,
            owner_id,
        })
    }
}

fn required(field: &str, value: Option<&str>) -> Result<String, CoreError> {
    optional(field, value)?.ok_or_else(|| CoreError::Validation(format!("{field} is required")))
}

/// Trimmed value, `None` when absent or blank.
fn optional(field: &str, value: Option<&str>) -> Result<Option<String>, CoreError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    check_identifier(field, value)?;
    Ok(Some(value.to_string()))
}

/// Reject identifiers that are too long or carry control characters.
pub fn check_identifier(field: &str, value: &str) -> Result<(), CoreError> {
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {MAX_IDENTIFIER_LEN} bytes"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(CoreError::Validation(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(())
}
