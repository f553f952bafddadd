//! Job lifecycle coordinator.
//!
//! Every state change goes through [`JobStore::upsert`] with the pure
//! [`lifecycle::apply`] rules as the mutator, so a dispatch result and a
//! callback for the same job racing each other compose into one
//! consistent record.

use std::sync::Arc;

use chrono::Utc;
use pixeltrace_core::job::Job;
use pixeltrace_core::lifecycle::{self, CallbackOutcome, LifecycleEvent, Outcome, Transition};
use pixeltrace_db::{JobStore, StoreError};
use serde_json::Value;

/// Applies lifecycle events to stored jobs.
pub struct JobCoordinator {
    store: Arc<dyn JobStore>,
}

impl JobCoordinator {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Mark a queued job as being handed to the provider.
    pub async fn begin_dispatch(&self, id: &str) -> Result<Job, StoreError> {
        Ok(self.step(id, LifecycleEvent::DispatchStarted).await?.job)
    }

    /// Record what the provider call returned.
    ///
    /// A no-op if a callback already moved the job to a terminal state.
    pub async fn on_dispatch_result(
        &self,
        id: &str,
        result: Result<Value, String>,
    ) -> Result<Job, StoreError> {
        let event = match result {
            Ok(dispatch_info) => LifecycleEvent::DispatchSucceeded { dispatch_info },
            Err(error) => LifecycleEvent::DispatchFailed { error },
        };
        Ok(self.step(id, event).await?.job)
    }

    /// Apply a runner callback, creating the record if the id is unknown.
    pub async fn on_callback(
        &self,
        id: &str,
        outcome: CallbackOutcome,
    ) -> Result<Transition, StoreError> {
        self.step(id, LifecycleEvent::CallbackReceived(outcome)).await
    }

    async fn step(&self, id: &str, event: LifecycleEvent) -> Result<Transition, StoreError> {
        let owned_id = id.to_string();
        let transition = self
            .store
            .upsert(
                id,
                Box::new(move |current| lifecycle::apply(current, &owned_id, event, Utc::now())),
            )
            .await?;

        match transition.outcome {
            Outcome::Created { state } => {
                tracing::info!(job_id = %id, %state, "Callback created job record");
            }
            Outcome::Advanced { from, to } => {
                tracing::info!(job_id = %id, %from, %to, "Job state advanced");
            }
            Outcome::Duplicate { conflicting } => {
                tracing::warn!(
                    job_id = %id,
                    state = %transition.job.state,
                    conflicting,
                    "Duplicate callback for terminal job",
                );
            }
            Outcome::Unchanged => {
                tracing::debug!(job_id = %id, state = %transition.job.state, "Job event ignored");
            }
        }

        Ok(transition)
    }
}
