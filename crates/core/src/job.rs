//! The indexing job record and its lifecycle states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp, PUBLIC_OWNER_ID};

/// Where a job is in its submit → callback lifecycle.
///
/// Ordering follows the lifecycle, so `a < b` means `b` is further along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Dispatching,
    Processing,
    Ready,
    Failed,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Queued,
        JobState::Dispatching,
        JobState::Processing,
        JobState::Ready,
        JobState::Failed,
    ];

    /// `Ready` and `Failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Ready | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Dispatching => "dispatching",
            JobState::Processing => "processing",
            JobState::Ready => "ready",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| CoreError::Internal(format!("Unknown job state '{s}'")))
    }
}

/// A tracked indexing job.
///
/// `id` is the only correlation key between the dispatch and the callback.
/// Records created by a callback that arrived without a tracked dispatch
/// have no `folder_id` or `event_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// A freshly submitted job, waiting for dispatch.
    pub fn queued(
        id: impl Into<JobId>,
        owner_id: impl Into<String>,
        folder_id: impl Into<String>,
        event_name: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            state: JobState::Queued,
            owner_id: owner_id.into(),
            folder_id: Some(folder_id.into()),
            event_name: Some(event_name.into()),
            created_at: now,
            updated_at: now,
            dispatch_info: None,
            manifest: None,
            error: None,
        }
    }

    /// A bare record in `state` with nothing but identity and timestamps.
    pub fn bare(id: impl Into<JobId>, state: JobState, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            state,
            owner_id: PUBLIC_OWNER_ID.to_string(),
            folder_id: None,
            event_name: None,
            created_at: now,
            updated_at: now,
            dispatch_info: None,
            manifest: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
