//! Job submission and dispatch.
//!
//! Validates a submission, creates the `queued` record, hands the job to
//! the compute provider exactly once and records the result. Provider
//! failures become job state (`failed`) instead of submit errors.

use std::sync::Arc;

use chrono::Utc;
use pixeltrace_core::error::CoreError;
use pixeltrace_core::job::Job;
use pixeltrace_core::submission::SubmitRequest;
use pixeltrace_db::{JobStore, StoreError};
use pixeltrace_provider::{ComputeProvider, DispatchRequest};

use super::coordinator::JobCoordinator;

/// Turns submit requests into provider calls.
pub struct JobDispatcher {
    store: Arc<dyn JobStore>,
    coordinator: Arc<JobCoordinator>,
    provider: Arc<dyn ComputeProvider>,
    callback_url: String,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        coordinator: Arc<JobCoordinator>,
        provider: Arc<dyn ComputeProvider>,
        callback_url: String,
    ) -> Self {
        Self {
            store,
            coordinator,
            provider,
            callback_url,
        }
    }

    /// Submit a job and return its record after the provider call.
    ///
    /// Invalid input fails before anything is stored. An id that already
    /// exists fails with [`StoreError::Conflict`] and the provider is not
    /// called.
    ///
    /// Once the record exists, the dispatch runs on its own task: dropping
    /// the returned future (request timeout, client disconnect) does not
    /// stop the job from reaching `processing` or `failed`.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<Job, StoreError> {
        let valid = request.validate()?;

        let job = Job::queued(
            valid.job_id.clone(),
            valid.owner_id.clone(),
            valid.folder_id.clone(),
            valid.event_name.clone(),
            Utc::now(),
        );
        self.store.create(job).await?;
        tracing::info!(
            job_id = %valid.job_id,
            owner_id = %valid.owner_id,
            folder_id = %valid.folder_id,
            "Job queued",
        );

        let dispatch = DispatchRequest {
            job_id: valid.job_id,
            folder_id: valid.folder_id,
            event_name: valid.event_name,
            owner_id: valid.owner_id,
            callback_url: self.callback_url.clone(),
        };
        let job_id = dispatch.job_id.clone();

        let task = tokio::spawn(dispatch_and_record(
            Arc::clone(&self.coordinator),
            Arc::clone(&self.provider),
            dispatch,
        ));

        task.await.map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Dispatch task failed");
            StoreError::Rejected(CoreError::Internal(format!("Dispatch task failed: {e}")))
        })?
    }
}

/// Mark the job dispatching, call the provider once and record the result.
async fn dispatch_and_record(
    coordinator: Arc<JobCoordinator>,
    provider: Arc<dyn ComputeProvider>,
    request: DispatchRequest,
) -> Result<Job, StoreError> {
    let id = request.job_id.as_str();

    if let Err(e) = coordinator.begin_dispatch(id).await {
        tracing::error!(job_id = %id, error = %e, "Could not mark job as dispatching");
        return fail_job(&coordinator, id, format!("Dispatch not started: {e}"), e).await;
    }

    let result = match provider.dispatch(&request).await {
        Ok(info) => {
            tracing::info!(job_id = %id, provider = provider.name(), "Job dispatched");
            Ok(info)
        }
        Err(e) => {
            tracing::error!(
                job_id = %id,
                provider = provider.name(),
                error = %e,
                "Provider dispatch failed",
            );
            Err(format!("Provider dispatch failed: {e}"))
        }
    };

    match coordinator.on_dispatch_result(id, result).await {
        Ok(job) => Ok(job),
        Err(e) => {
            tracing::error!(job_id = %id, error = %e, "Could not record dispatch result");
            fail_job(&coordinator, id, format!("Dispatch result not recorded: {e}"), e).await
        }
    }
}

/// Best-effort move to `failed` after a store error, so the record does not
/// stay in flight forever. Returns `cause` if that write fails too.
async fn fail_job(
    coordinator: &JobCoordinator,
    id: &str,
    reason: String,
    cause: StoreError,
) -> Result<Job, StoreError> {
    match coordinator.on_dispatch_result(id, Err(reason)).await {
        Ok(job) if job.is_terminal() => Ok(job),
        Ok(_) => Err(cause),
        Err(e) => {
            tracing::error!(job_id = %id, error = %e, "Could not mark job as failed");
            Err(cause)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use pixeltrace_core::job::JobState;
    use pixeltrace_db::{MemoryJobStore, Mutator};
    use pixeltrace_core::lifecycle::Transition;
    use pixeltrace_provider::ProviderError;
    use serde_json::{json, Value};

    /// Memory store whose listed `upsert` calls (0-based) fail.
    struct FlakyStore {
        inner: MemoryJobStore,
        upserts: AtomicUsize,
        failing: Vec<usize>,
    }

    impl FlakyStore {
        fn failing(failing: &[usize]) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryJobStore::new(),
                upserts: AtomicUsize::new(0),
                failing: failing.to_vec(),
            })
        }
    }

    #[async_trait]
    impl JobStore for FlakyStore {
        async fn create(&self, job: Job) -> Result<Job, StoreError> {
            self.inner.create(job).await
        }

        async fn upsert(&self, id: &str, mutator: Mutator) -> Result<Transition, StoreError> {
            let call = self.upserts.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&call) {
                return Err(StoreError::Corrupt {
                    id: id.to_string(),
                    reason: "write lost".into(),
                });
            }
            self.inner.upsert(id, mutator).await
        }

        async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
            self.inner.get(id).await
        }

        async fn health_check(&self) -> Result<(), StoreError> {
            Ok(())
        }

        fn backend(&self) -> &'static str {
            "flaky"
        }
    }

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ComputeProvider for CountingProvider {
        async fn dispatch(&self, _request: &DispatchRequest) -> Result<Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"id": "remote-1"}))
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn dispatcher(store: Arc<dyn JobStore>, provider: Arc<CountingProvider>) -> JobDispatcher {
        let coordinator = Arc::new(JobCoordinator::new(Arc::clone(&store)));
        JobDispatcher::new(store, coordinator, provider, "http://coord/api/v1/callback".into())
    }

    fn request(event_name: &str) -> SubmitRequest {
        serde_json::from_value(json!({"folderId": "F1", "eventName": event_name})).unwrap()
    }

    #[tokio::test]
    async fn accepted_dispatch_ends_processing() {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let provider = Arc::new(CountingProvider::default());

        let job = dispatcher(Arc::clone(&store), provider.clone()).submit(&request("E1")).await.unwrap();

        assert_eq!(job.state, JobState::Processing);
        assert_eq!(job.dispatch_info, Some(json!({"id": "remote-1"})));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_error_before_dispatch_fails_job_without_provider_call() {
        let store = FlakyStore::failing(&[0]);
        let provider = Arc::new(CountingProvider::default());

        let job = dispatcher(store.clone(), provider.clone()).submit(&request("E1")).await.unwrap();

        assert_eq!(job.state, JobState::Failed);
        assert!(job.error.unwrap().starts_with("Dispatch not started"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.get("E1").await.unwrap().unwrap().state, JobState::Failed);
    }

    #[tokio::test]
    async fn store_error_recording_result_fails_job() {
        let store = FlakyStore::failing(&[1]);
        let provider = Arc::new(CountingProvider::default());

        let job = dispatcher(store.clone(), provider.clone()).submit(&request("E1")).await.unwrap();

        assert_eq!(job.state, JobState::Failed);
        assert!(job.error.unwrap().starts_with("Dispatch result not recorded"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrecoverable_store_error_is_returned() {
        let store = FlakyStore::failing(&[0, 1]);
        let provider = Arc::new(CountingProvider::default());

        let result = dispatcher(store.clone(), provider.clone()).submit(&request("E1")).await;

        assert_matches!(result, Err(StoreError::Corrupt { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
