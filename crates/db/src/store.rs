//! The job store contract shared by all backends.

use async_trait::async_trait;
use pixeltrace_core::error::CoreError;
use pixeltrace_core::job::Job;
use pixeltrace_core::lifecycle::Transition;

/// Read-modify-write step applied by [`JobStore::upsert`].
///
/// Receives the current record (`None` if the id is unknown) and returns
/// the transition to persist. Returning an error aborts the unit without
/// writing anything.
pub type Mutator = Box<dyn FnOnce(Option<Job>) -> Result<Transition, CoreError> + Send>;

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `create` found an existing record for the id.
    #[error("Job '{id}' already exists")]
    Conflict { id: String },

    /// The mutator rejected the current record.
    #[error(transparent)]
    Rejected(#[from] CoreError),

    /// The in-memory store reached its configured record limit.
    #[error("Job store is full ({max_jobs} records)")]
    Capacity { max_jobs: usize },

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row could not be turned back into a [`Job`].
    #[error("Corrupt job record '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

/// Durable (or process-lifetime) mapping from job id to [`Job`].
///
/// `upsert` serializes concurrent calls for the same id; calls for
/// different ids must not wait on each other.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::Conflict`] if the id
    /// is already taken, whatever state that record is in.
    async fn create(&self, job: Job) -> Result<Job, StoreError>;

    /// Atomically read the current record, apply `mutator` and write the
    /// result back unless the outcome is `Unchanged`.
    async fn upsert(&self, id: &str, mutator: Mutator) -> Result<Transition, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// Whether the backend can currently serve requests.
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Short backend name for logs and `/health`.
    fn backend(&self) -> &'static str;
}
