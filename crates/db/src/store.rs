//! The job store seam.
//!
//! The worker only ever talks to a [`JobStore`]: claim a batch, commit a
//! result, and (optionally) sweep stale claims. Seeding and inspection
//! methods round out what the CLI and tests need.

use async_trait::async_trait;
use promptq_core::error::CoreError;
use promptq_core::job::{Job, JobStatus};
use promptq_core::types::{JobId, Timestamp};

use crate::repositories::JobRepo;
use crate::table::TableName;
use crate::DbPool;

/// Errors from the job store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database rejected or failed the operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored record could not be decoded into a [`Job`].
    #[error("corrupt job record: {0}")]
    Corrupt(#[from] CoreError),

    /// An insert collided with an existing id.
    #[error("job {0} already exists")]
    Duplicate(JobId),
}

/// Persistent queue of generation jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Mark up to `limit` jobs in `new` as `claimed`, stamping
    /// `time_started`, and return them.
    async fn claim_batch(&self, limit: usize, started_at: Timestamp)
        -> Result<Vec<Job>, StoreError>;

    /// Conditionally move `claimed → processed`. `false` means the job
    /// was not claimed and nothing changed.
    async fn mark_processed(
        &self,
        id: JobId,
        response: &str,
        completed_at: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Conditionally move `claimed → failed`.
    async fn mark_failed(&self, id: JobId, completed_at: Timestamp) -> Result<bool, StoreError>;

    /// Revert jobs claimed before `claimed_before` to `new`.
    async fn release_stale_claims(&self, claimed_before: Timestamp) -> Result<u64, StoreError>;

    async fn insert_many(&self, jobs: &[Job]) -> Result<u64, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    async fn count_by_status(&self, status: JobStatus) -> Result<i64, StoreError>;

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, StoreError>;
}

/// PostgreSQL-backed [`JobStore`].
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
    table: TableName,
}

impl PgJobStore {
    pub fn new(pool: DbPool, table: TableName) -> Self {
        Self { pool, table }
    }

    /// Create the table if needed and return the store.
    pub async fn connect(pool: DbPool, table: TableName) -> Result<Self, StoreError> {
        JobRepo::ensure_table(&pool, &table).await?;
        tracing::debug!(table = %table, "Jobs table ready");
        Ok(Self::new(pool, table))
    }

    /// Release the pool's connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn claim_batch(
        &self,
        limit: usize,
        started_at: Timestamp,
    ) -> Result<Vec<Job>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = JobRepo::claim_batch(&self.pool, &self.table, limit, started_at).await?;
        rows.into_iter()
            .map(|row| Job::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn mark_processed(
        &self,
        id: JobId,
        response: &str,
        completed_at: Timestamp,
    ) -> Result<bool, StoreError> {
        Ok(JobRepo::mark_processed(&self.pool, &self.table, id, response, completed_at).await?)
    }

    async fn mark_failed(&self, id: JobId, completed_at: Timestamp) -> Result<bool, StoreError> {
        Ok(JobRepo::mark_failed(&self.pool, &self.table, id, completed_at).await?)
    }

    async fn release_stale_claims(&self, claimed_before: Timestamp) -> Result<u64, StoreError> {
        Ok(JobRepo::release_stale_claims(&self.pool, &self.table, claimed_before).await?)
    }

    async fn insert_many(&self, jobs: &[Job]) -> Result<u64, StoreError> {
        Ok(JobRepo::insert_many(&self.pool, &self.table, jobs).await?)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(JobRepo::count(&self.pool, &self.table).await?)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64, StoreError> {
        Ok(JobRepo::count_by_status(&self.pool, &self.table, status).await?)
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        JobRepo::find_by_id(&self.pool, &self.table, id)
            .await?
            .map(|row| Job::try_from(row).map_err(StoreError::from))
            .transpose()
    }
}
