//! Job lifecycle state machine.
//!
//! [`apply`] is the single place that decides what a dispatch result or a
//! callback does to a job. It is pure: stores call it inside their atomic
//! read-modify-write unit with whatever record they currently hold.

use serde_json::Value;

use crate::error::CoreError;
use crate::job::{Job, JobState};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Transition table. States only move forward; terminal states go nowhere.
pub mod state_machine {
    use crate::job::JobState;

    /// Returns the states reachable from `from` in one step.
    ///
    /// Skipping ahead is allowed: a callback can land while the job is
    /// still `Queued` or `Dispatching`.
    pub fn valid_transitions(from: JobState) -> &'static [JobState] {
        match from {
            JobState::Queued => &[
                JobState::Dispatching,
                JobState::Processing,
                JobState::Ready,
                JobState::Failed,
            ],
            JobState::Dispatching => &[JobState::Processing, JobState::Ready, JobState::Failed],
            JobState::Processing => &[JobState::Ready, JobState::Failed],
            JobState::Ready | JobState::Failed => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: JobState, to: JobState) -> bool {
        valid_transitions(from).contains(&to)
    }
}

// ---------------------------------------------------------------------------
// Events and outcomes
// ---------------------------------------------------------------------------

/// Something that happened to a job.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The dispatcher is about to call the compute provider.
    DispatchStarted,
    /// The provider accepted the job. `dispatch_info` is its opaque reply.
    DispatchSucceeded { dispatch_info: Value },
    /// The provider call failed (network, 4xx, 5xx, spawn failure).
    DispatchFailed { error: String },
    /// The job runner called back with its result.
    CallbackReceived(CallbackOutcome),
}

/// What a callback reports about a job.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackOutcome {
    pub manifest: Option<Value>,
    pub is_error: bool,
    pub error: Option<String>,
    /// Owner recorded if the callback creates the record.
    pub owner_id: Option<String>,
}

impl CallbackOutcome {
    pub fn target_state(&self) -> JobState {
        if self.is_error {
            JobState::Failed
        } else {
            JobState::Ready
        }
    }

    fn error_detail(&self) -> Option<String> {
        if !self.is_error {
            return None;
        }
        Some(
            self.error
                .clone()
                .unwrap_or_else(|| "Indexing job reported failure".to_string()),
        )
    }
}

/// How [`apply`] changed the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No record existed; a callback created one directly in `state`.
    Created { state: JobState },
    /// A valid forward transition was applied.
    Advanced { from: JobState, to: JobState },
    /// Callback for a job that is already terminal. Only `updated_at`
    /// moved. `conflicting` is set when the callback disagreed with the
    /// stored terminal state.
    Duplicate { conflicting: bool },
    /// Nothing to write.
    Unchanged,
}

impl Outcome {
    /// Whether the store has to persist the resulting record.
    pub fn writes(self) -> bool {
        !matches!(self, Outcome::Unchanged)
    }
}

/// The record after an event together with what happened to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub job: Job,
    pub outcome: Outcome,
}

impl Transition {
    pub fn unchanged(job: Job) -> Self {
        Self {
            job,
            outcome: Outcome::Unchanged,
        }
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Apply `event` to the current record for `id`.
///
/// - A callback for an unknown id creates the record in its terminal state.
/// - The first terminal write wins. Later callbacks only bump `updated_at`
///   and never touch `manifest`.
/// - Dispatch events never move a terminal job and fail with `NotFound`
///   for an unknown id.
pub fn apply(
    current: Option<Job>,
    id: &str,
    event: LifecycleEvent,
    now: Timestamp,
) -> Result<Transition, CoreError> {
    let Some(mut job) = current else {
        let LifecycleEvent::CallbackReceived(callback) = event else {
            return Err(CoreError::job_not_found(id));
        };
        let state = callback.target_state();
        let mut job = Job::bare(id, state, now);
        if let Some(owner_id) = callback.owner_id.clone() {
            job.owner_id = owner_id;
        }
        job.error = callback.error_detail();
        job.manifest = callback.manifest;
        return Ok(Transition {
            job,
            outcome: Outcome::Created { state },
        });
    };

    if job.is_terminal() {
        return Ok(match event {
            LifecycleEvent::CallbackReceived(callback) => {
                let conflicting = callback.target_state() != job.state;
                job.updated_at = now;
                Transition {
                    job,
                    outcome: Outcome::Duplicate { conflicting },
                }
            }
            _ => Transition::unchanged(job),
        });
    }

    let from = job.state;
    let to = match &event {
        LifecycleEvent::DispatchStarted => JobState::Dispatching,
        LifecycleEvent::DispatchSucceeded { .. } => JobState::Processing,
        LifecycleEvent::DispatchFailed { .. } => JobState::Failed,
        LifecycleEvent::CallbackReceived(callback) => callback.target_state(),
    };

    // A repeated dispatch event the job has already moved past.
    if !state_machine::can_transition(from, to) {
        return Ok(Transition::unchanged(job));
    }

    match event {
        LifecycleEvent::DispatchStarted => {}
        LifecycleEvent::DispatchSucceeded { dispatch_info } => {
            job.dispatch_info = Some(dispatch_info);
        }
        LifecycleEvent::DispatchFailed { error } => {
            job.error = Some(error);
        }
        LifecycleEvent::CallbackReceived(callback) => {
            job.error = callback.error_detail();
            job.manifest = callback.manifest;
        }
    }
    job.state = to;
    job.updated_at = now;

    Ok(Transition {
        job,
        outcome: Outcome::Advanced { from, to },
    })
}
