//! PostgreSQL-backed job store.
//!
//! `upsert` serializes per id with a transaction-scoped advisory lock
//! keyed on a hash of the id. The lock also covers ids that have no row
//! yet, which `SELECT ... FOR UPDATE` cannot.

use async_trait::async_trait;
use pixeltrace_core::job::{Job, JobState};
use pixeltrace_core::lifecycle::Transition;
use pixeltrace_core::types::Timestamp;
use sqlx::FromRow;

use crate::store::{JobStore, Mutator, StoreError};
use crate::DbPool;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, state, owner_id, folder_id, event_name, \
    dispatch_info, manifest, error, \
    created_at, updated_at";

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
struct JobRow {
    id: String,
    state: String,
    owner_id: String,
    folder_id: Option<String>,
    event_name: Option<String>,
    dispatch_info: Option<serde_json::Value>,
    manifest: Option<serde_json::Value>,
    error: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let state: JobState = row.state.parse().map_err(|_| StoreError::Corrupt {
            id: row.id.clone(),
            reason: format!("unknown state '{}'", row.state),
        })?;
        Ok(Job {
            id: row.id,
            state,
            owner_id: row.owner_id,
            folder_id: row.folder_id,
            event_name: row.event_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
            dispatch_info: row.dispatch_info,
            manifest: row.manifest,
            error: row.error,
        })
    }
}

/// [`JobStore`] over a shared `jobs` table.
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: Job) -> Result<Job, StoreError> {
        let query = format!(
            "INSERT INTO jobs ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(&job.id)
            .bind(job.state.as_str())
            .bind(&job.owner_id)
            .bind(&job.folder_id)
            .bind(&job.event_name)
            .bind(&job.dispatch_info)
            .bind(&job.manifest)
            .bind(&job.error)
            .bind(job.created_at)
            .bind(job.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => {
                tracing::debug!(job_id = %job.id, "Insert skipped, job already exists");
                Err(StoreError::Conflict { id: job.id })
            }
        }
    }

    async fn upsert(&self, id: &str, mutator: Mutator) -> Result<Transition, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        let current = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .map(Job::try_from)
            .transpose()?;

        // Dropping `tx` on error rolls back and releases the lock.
        let transition = mutator(current)?;

        if transition.outcome.writes() {
            let job = &transition.job;
            let query = format!(
                "INSERT INTO jobs ({COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                 ON CONFLICT (id) DO UPDATE SET \
                     state = EXCLUDED.state, \
                     owner_id = EXCLUDED.owner_id, \
                     folder_id = EXCLUDED.folder_id, \
                     event_name = EXCLUDED.event_name, \
                     dispatch_info = EXCLUDED.dispatch_info, \
                     manifest = EXCLUDED.manifest, \
                     error = EXCLUDED.error, \
                     updated_at = EXCLUDED.updated_at"
            );
            sqlx::query(&query)
                .bind(&job.id)
                .bind(job.state.as_str())
                .bind(&job.owner_id)
                .bind(&job.folder_id)
                .bind(&job.event_name)
                .bind(&job.dispatch_info)
                .bind(&job.manifest)
                .bind(&job.error)
                .bind(job.created_at)
                .bind(job.updated_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(transition)
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
