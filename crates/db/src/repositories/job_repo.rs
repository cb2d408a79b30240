//! Repository for the jobs table.
//!
//! Every status transition is a conditional update filtered on the
//! expected current status, so a transition that lost a race affects
//! zero rows instead of overwriting someone else's result.

use promptq_core::job::{Job, JobStatus};
use promptq_core::types::{JobId, Timestamp};
use sqlx::PgPool;

use crate::models::job::JobRow;
use crate::table::TableName;

/// Column list for job queries.
const COLUMNS: &str = "\
    id, system, question, status, response, \
    time_added, time_started, time_completed";

/// Provides queue operations for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Create the jobs table and its status index if they do not exist.
    pub async fn ensure_table(pool: &PgPool, table: &TableName) -> Result<(), sqlx::Error> {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} ( \
                 id BIGINT PRIMARY KEY, \
                 system TEXT NOT NULL, \
                 question TEXT NOT NULL, \
                 status TEXT NOT NULL DEFAULT 'new' \
                     CHECK (status IN ('new', 'claimed', 'processed', 'failed')), \
                 response TEXT NOT NULL DEFAULT '', \
                 time_added TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
                 time_started TIMESTAMPTZ, \
                 time_completed TIMESTAMPTZ \
             )"
        );
        sqlx::query(&create).execute(pool).await?;

        let index = format!("CREATE INDEX IF NOT EXISTS {table}_status_idx ON {table} (status)");
        sqlx::query(&index).execute(pool).await?;
        Ok(())
    }

    /// Insert jobs in one transaction. Returns the number of rows written.
    pub async fn insert_many(
        pool: &PgPool,
        table: &TableName,
        jobs: &[Job],
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "INSERT INTO {table} ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        );

        let mut tx = pool.begin().await?;
        let mut inserted = 0;
        for job in jobs {
            inserted += sqlx::query(&query)
                .bind(job.id)
                .bind(&job.system)
                .bind(&job.question)
                .bind(job.status.as_str())
                .bind(&job.response)
                .bind(job.time_added)
                .bind(job.time_started)
                .bind(job.time_completed)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Total number of jobs in the table.
    pub async fn count(pool: &PgPool, table: &TableName) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM {table}");
        sqlx::query_scalar(&query).fetch_one(pool).await
    }

    /// Number of jobs currently in `status`.
    pub async fn count_by_status(
        pool: &PgPool,
        table: &TableName,
        status: JobStatus,
    ) -> Result<i64, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM {table} WHERE status = $1");
        sqlx::query_scalar(&query)
            .bind(status.as_str())
            .fetch_one(pool)
            .await
    }

    /// Fetch a single job.
    pub async fn find_by_id(
        pool: &PgPool,
        table: &TableName,
        id: JobId,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {table} WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim up to `limit` new jobs.
    ///
    /// Selection and update happen in one statement; `FOR UPDATE SKIP
    /// LOCKED` keeps concurrent claimers from picking the same rows, so
    /// several worker processes can drain one table.
    pub async fn claim_batch(
        pool: &PgPool,
        table: &TableName,
        limit: i64,
        started_at: Timestamp,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE {table} \
             SET status = $1, time_started = $2 \
             WHERE status = $3 AND id IN ( \
                 SELECT id FROM {table} \
                 WHERE status = $3 \
                 LIMIT $4 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Claimed.as_str())
            .bind(started_at)
            .bind(JobStatus::New.as_str())
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Move a claimed job to `processed` with its response.
    ///
    /// Returns `false` if the job was not in `claimed`.
    pub async fn mark_processed(
        pool: &PgPool,
        table: &TableName,
        id: JobId,
        response: &str,
        completed_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {table} \
             SET status = $2, response = $3, time_completed = $4 \
             WHERE id = $1 AND status = $5"
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(JobStatus::Processed.as_str())
            .bind(response)
            .bind(completed_at)
            .bind(JobStatus::Claimed.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a claimed job to `failed`.
    ///
    /// Returns `false` if the job was not in `claimed`.
    pub async fn mark_failed(
        pool: &PgPool,
        table: &TableName,
        id: JobId,
        completed_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {table} \
             SET status = $2, time_completed = $3 \
             WHERE id = $1 AND status = $4"
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(JobStatus::Failed.as_str())
            .bind(completed_at)
            .bind(JobStatus::Claimed.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Return jobs claimed before `claimed_before` to `new`.
    ///
    /// Clears `time_started` so the next claim sets it afresh. Returns
    /// the number of jobs released.
    pub async fn release_stale_claims(
        pool: &PgPool,
        table: &TableName,
        claimed_before: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "UPDATE {table} \
             SET status = $1, time_started = NULL \
             WHERE status = $2 AND time_started < $3"
        );
        let result = sqlx::query(&query)
            .bind(JobStatus::New.as_str())
            .bind(JobStatus::Claimed.as_str())
            .bind(claimed_before)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
