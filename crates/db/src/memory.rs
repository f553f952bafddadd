//! Process-lifetime job store with per-key locking.
//!
//! The outer map is locked only long enough to find or insert a job's
//! slot. Mutators run under the slot's own mutex, so work on one id never
//! waits behind work on another.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pixeltrace_core::job::Job;
use pixeltrace_core::lifecycle::Transition;
use tokio::sync::{Mutex, RwLock};

use crate::store::{JobStore, Mutator, StoreError};

/// Default upper bound on tracked records.
pub const DEFAULT_MAX_JOBS: usize = 100_000;

type Slot = Arc<Mutex<Option<Job>>>;

/// In-memory [`JobStore`].
///
/// Slots are never removed: a slot whose mutator failed stays empty and
/// reads as absent. Removing it could hand later writers a detached slot.
#[derive(Debug)]
pub struct MemoryJobStore {
    slots: RwLock<HashMap<String, Slot>>,
    max_jobs: usize,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_JOBS)
    }

    pub fn with_capacity(max_jobs: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            max_jobs,
        }
    }

    /// Existing slot for `id`, if any.
    async fn existing_slot(&self, id: &str) -> Option<Slot> {
        self.slots.read().await.get(id).cloned()
    }

    /// Find or insert the slot for `id`.
    async fn slot(&self, id: &str) -> Result<Slot, StoreError> {
        if let Some(slot) = self.existing_slot(id).await {
            return Ok(slot);
        }

        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.get(id) {
            return Ok(Arc::clone(slot));
        }
        if slots.len() >= self.max_jobs {
            tracing::warn!(max_jobs = self.max_jobs, job_id = %id, "In-memory job store is full");
            return Err(StoreError::Capacity {
                max_jobs: self.max_jobs,
            });
        }
        let slot: Slot = Arc::new(Mutex::new(None));
        slots.insert(id.to_string(), Arc::clone(&slot));
        Ok(slot)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: Job) -> Result<Job, StoreError> {
        let slot = self.slot(&job.id).await?;
        let mut current = slot.lock().await;
        if current.is_some() {
            return Err(StoreError::Conflict { id: job.id });
        }
        *current = Some(job.clone());
        Ok(job)
    }

    async fn upsert(&self, id: &str, mutator: Mutator) -> Result<Transition, StoreError> {
        let slot = self.slot(id).await?;
        let mut current = slot.lock().await;
        let transition = mutator(current.clone())?;
        if transition.outcome.writes() {
            *current = Some(transition.job.clone());
        }
        Ok(transition)
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let Some(slot) = self.existing_slot(id).await else {
            return Ok(None);
        };
        let current = slot.lock().await;
        Ok(current.clone())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use chrono::Utc;
    use pixeltrace_core::error::CoreError;
    use pixeltrace_core::job::JobState;
    use pixeltrace_core::lifecycle::Outcome;
    use serde_json::{json, Value};

    use super::*;

    fn queued(id: &str) -> Job {
        Job::queued(id, "public", "F1", id, Utc::now())
    }

    /// Mutator that records how many writes it saw before its own.
    fn append_counter(id: &'static str) -> Mutator {
        Box::new(move |current| {
            let mut job = current.unwrap_or_else(|| Job::bare(id, JobState::Processing, Utc::now()));
            let mut seen = job
                .dispatch_info
                .take()
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            seen.push(json!(seen.len()));
            job.dispatch_info = Some(Value::Array(seen));
            Ok(Transition {
                job,
                outcome: Outcome::Advanced {
                    from: JobState::Processing,
                    to: JobState::Processing,
                },
            })
        })
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = MemoryJobStore::new();
        store.create(queued("E1")).await.unwrap();

        let job = store.get("E1").await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert!(store.get("E2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_rejects_existing_id() {
        let store = MemoryJobStore::new();
        store.create(queued("E1")).await.unwrap();

        let err = store.create(queued("E1")).await.unwrap_err();
        assert_matches!(err, StoreError::Conflict { id } if id == "E1");
    }

    #[tokio::test]
    async fn create_never_overwrites_a_terminal_job() {
        let store = MemoryJobStore::new();
        store
            .create(Job::bare("X", JobState::Ready, Utc::now()))
            .await
            .unwrap();

        assert_matches!(
            store.create(queued("X")).await,
            Err(StoreError::Conflict { .. })
        );
        let job = store.get("X").await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Ready);
    }

    #[tokio::test]
    async fn failed_mutator_writes_nothing() {
        let store = MemoryJobStore::new();
        let err = store
            .upsert("ghost", Box::new(|_| Err(CoreError::job_not_found("ghost"))))
            .await
            .unwrap_err();

        assert_matches!(err, StoreError::Rejected(CoreError::NotFound { .. }));
        assert!(store.get("ghost").await.unwrap().is_none());
        // The empty slot still lets a later create succeed.
        store.create(queued("ghost")).await.unwrap();
    }

    #[tokio::test]
    async fn unchanged_outcome_is_not_persisted() {
        let store = MemoryJobStore::new();
        store.create(queued("E1")).await.unwrap();

        let t = store
            .upsert(
                "E1",
                Box::new(|current| {
                    let mut job = current.unwrap();
                    job.state = JobState::Failed;
                    Ok(Transition::unchanged(job))
                }),
            )
            .await
            .unwrap();

        assert_eq!(t.outcome, Outcome::Unchanged);
        assert_eq!(store.get("E1").await.unwrap().unwrap().state, JobState::Queued);
    }

    #[tokio::test]
    async fn capacity_limit_applies_to_new_ids_only() {
        let store = MemoryJobStore::with_capacity(1);
        store.create(queued("E1")).await.unwrap();

        assert_matches!(
            store.create(queued("E2")).await,
            Err(StoreError::Capacity { max_jobs: 1 })
        );
        // Existing ids can still be updated.
        store.upsert("E1", append_counter("E1")).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_upserts_on_one_id_lose_no_updates() {
        const N: usize = 200;
        let store = Arc::new(MemoryJobStore::new());

        let tasks: Vec<_> = (0..N)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.upsert("K", append_counter("K")).await })
            })
            .collect();

        let mut observed = Vec::with_capacity(N);
        for result in futures::future::join_all(tasks).await {
            let transition = result.unwrap().unwrap();
            let seen = transition.job.dispatch_info.unwrap();
            observed.push(seen.as_array().unwrap().len() - 1);
        }

        // Every writer saw a distinct, fully applied predecessor.
        observed.sort_unstable();
        assert_eq!(observed, (0..N).collect::<Vec<_>>());

        let final_job = store.get("K").await.unwrap().unwrap();
        let expected: Vec<Value> = (0..N).map(|i| json!(i)).collect();
        assert_eq!(final_job.dispatch_info, Some(Value::Array(expected)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn upsert_on_one_id_does_not_block_another() {
        let store = Arc::new(MemoryJobStore::new());
        let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let slow_store = Arc::clone(&store);
        let slow = tokio::spawn(async move {
            slow_store
                .upsert(
                    "slow",
                    Box::new(move |current| {
                        entered_tx.send(()).unwrap();
                        release_rx.recv_timeout(Duration::from_secs(10)).unwrap();
                        let job = current
                            .unwrap_or_else(|| Job::bare("slow", JobState::Ready, Utc::now()));
                        Ok(Transition {
                            job,
                            outcome: Outcome::Created {
                                state: JobState::Ready,
                            },
                        })
                    }),
                )
                .await
        });

        tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(10)))
            .await
            .unwrap()
            .unwrap();

        // While "slow" is mid-mutation, other ids proceed.
        tokio::time::timeout(Duration::from_secs(2), store.create(queued("fast")))
            .await
            .expect("create on another id must not wait")
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), store.get("fast"))
            .await
            .expect("get on another id must not wait")
            .unwrap();

        release_tx.send(()).unwrap();
        slow.await.unwrap().unwrap();
        assert_eq!(
            store.get("slow").await.unwrap().unwrap().state,
            JobState::Ready
        );
    }
}
