//! Batch claiming.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use promptq_core::job::Job;
use promptq_core::timestamp::truncate_millis;
use promptq_db::store::{JobStore, StoreError};

/// Moves jobs from `new` to `claimed` on behalf of one orchestrator.
pub struct BatchClaimer {
    store: Arc<dyn JobStore>,
}

impl BatchClaimer {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Claim up to `limit` new jobs, stamping them with the current time.
    ///
    /// An empty result means the queue is drained.
    pub async fn claim(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        let started_at = truncate_millis(Utc::now());
        let jobs = self.store.claim_batch(limit, started_at).await?;
        tracing::debug!(requested = limit, claimed = jobs.len(), "Claimed batch");
        Ok(jobs)
    }

    /// Return jobs that have sat in `claimed` for longer than `age` to
    /// `new`.
    pub async fn release_stale(&self, age: Duration) -> Result<u64, StoreError> {
        // An age too large to represent means no claim can be that old.
        let Some(cutoff) = chrono::Duration::from_std(age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };

        let released = self.store.release_stale_claims(cutoff).await?;
        if released > 0 {
            tracing::warn!(
                released,
                age_secs = age.as_secs(),
                "Released stale claimed jobs back to new"
            );
        }
        Ok(released)
    }
}
