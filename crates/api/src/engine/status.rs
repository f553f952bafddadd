use std::sync::Arc;

use pixeltrace_core::error::CoreError;
use pixeltrace_core::job::Job;
use pixeltrace_db::{JobStore, StoreError};

/// Read-only view of the job store for client polling.
pub struct StatusQuery {
    store: Arc<dyn JobStore>,
}

impl StatusQuery {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Current record for `id`, or `NotFound`.
    pub async fn get(&self, id: &str) -> Result<Job, StoreError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| CoreError::job_not_found(id).into())
    }
}
