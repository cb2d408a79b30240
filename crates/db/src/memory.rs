//! In-memory [`JobStore`].
//!
//! Applies the same conditional transitions as the PostgreSQL store under
//! a single lock. Jobs are kept in id order, which is the order claims
//! pick them in.

use std::collections::BTreeMap;

use async_trait::async_trait;
use promptq_core::job::{Job, JobStatus};
use promptq_core::types::{JobId, Timestamp};
use tokio::sync::Mutex;

use crate::store::{JobStore, StoreError};

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<BTreeMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `jobs`. Later duplicates replace
    /// earlier ones.
    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let jobs = jobs.into_iter().map(|job| (job.id, job)).collect();
        Self {
            jobs: Mutex::new(jobs),
        }
    }

    /// Copy of every job, in id order.
    pub async fn snapshot(&self) -> Vec<Job> {
        self.jobs.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn claim_batch(
        &self,
        limit: usize,
        started_at: Timestamp,
    ) -> Result<Vec<Job>, StoreError> {
        let mut jobs = self.jobs.lock().await;
        let claimed = jobs
            .values_mut()
            .filter(|job| job.status == JobStatus::New)
            .take(limit)
            .map(|job| {
                job.status = JobStatus::Claimed;
                job.time_started = Some(started_at);
                job.clone()
            })
            .collect();
        Ok(claimed)
    }

    async fn mark_processed(
        &self,
        id: JobId,
        response: &str,
        completed_at: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Claimed => {
                job.status = JobStatus::Processed;
                job.response = response.to_string();
                job.time_completed = Some(completed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: JobId, completed_at: Timestamp) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status == JobStatus::Claimed => {
                job.status = JobStatus::Failed;
                job.time_completed = Some(completed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_stale_claims(&self, claimed_before: Timestamp) -> Result<u64, StoreError> {
        let mut jobs = self.jobs.lock().await;
        let mut released = 0;
        for job in jobs.values_mut() {
            let stale = job.status == JobStatus::Claimed
                && job.time_started.is_some_and(|started| started < claimed_before);
            if stale {
                job.status = JobStatus::New;
                job.time_started = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn insert_many(&self, new_jobs: &[Job]) -> Result<u64, StoreError> {
        let mut jobs = self.jobs.lock().await;
        if let Some(dup) = new_jobs.iter().find(|job| jobs.contains_key(&job.id)) {
            return Err(StoreError::Duplicate(dup.id));
        }
        for job in new_jobs {
            jobs.insert(job.id, job.clone());
        }
        Ok(new_jobs.len() as u64)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.jobs.lock().await.len() as i64)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64, StoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.values().filter(|job| job.status == status).count() as i64)
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn t(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn store(n: i64) -> MemoryJobStore {
        MemoryJobStore::with_jobs((1..=n).map(|id| Job::new(id, "s", format!("q{id}"), t(0))))
    }

    #[tokio::test]
    async fn claim_takes_at_most_limit_and_stamps_start() {
        let store = store(5);
        let batch = store.claim_batch(3, t(10)).await.unwrap();

        assert_eq!(batch.iter().map(|j| j.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(batch
            .iter()
            .all(|j| j.status == JobStatus::Claimed && j.time_started == Some(t(10))));
        assert_eq!(store.count_by_status(JobStatus::New).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn successive_claims_never_overlap() {
        let store = store(5);
        let first = store.claim_batch(3, t(1)).await.unwrap();
        let second = store.claim_batch(3, t(2)).await.unwrap();
        let third = store.claim_batch(3, t(3)).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        assert!(third.is_empty());
        assert!(first.iter().all(|a| second.iter().all(|b| a.id != b.id)));
    }

    #[tokio::test]
    async fn concurrent_claims_are_disjoint() {
        let store = store(20);
        let (a, b) = tokio::join!(store.claim_batch(8, t(1)), store.claim_batch(8, t(1)));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.len() + b.len(), 16);
        let mut ids: Vec<JobId> = a.iter().chain(&b).map(|j| j.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 16, "a job was claimed twice");
        assert_eq!(store.count_by_status(JobStatus::New).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn mark_processed_requires_claimed() {
        let store = store(2);
        assert!(!store.mark_processed(1, "x", t(5)).await.unwrap());

        store.claim_batch(1, t(1)).await.unwrap();
        assert!(store.mark_processed(1, "The end.", t(5)).await.unwrap());
        assert!(!store.mark_processed(1, "again", t(6)).await.unwrap());

        let job = store.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processed);
        assert_eq!(job.response, "The end.");
        assert_eq!(job.time_completed, Some(t(5)));
    }

    #[tokio::test]
    async fn mark_failed_leaves_response_empty() {
        let store = store(1);
        store.claim_batch(1, t(1)).await.unwrap();
        assert!(store.mark_failed(1, t(2)).await.unwrap());

        let job = store.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.response.is_empty());
        job.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn release_only_touches_old_claims() {
        let store = store(3);
        store.claim_batch(1, t(0)).await.unwrap();
        store.claim_batch(1, t(100)).await.unwrap();

        assert_eq!(store.release_stale_claims(t(50)).await.unwrap(), 1);

        let released = store.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(released.status, JobStatus::New);
        assert_eq!(released.time_started, None);
        let kept = store.find_by_id(2).await.unwrap().unwrap();
        assert_eq!(kept.status, JobStatus::Claimed);
    }

    #[tokio::test]
    async fn insert_rejects_duplicates_without_partial_writes() {
        let store = store(1);
        let err = store
            .insert_many(&[Job::new(2, "s", "q", t(0)), Job::new(1, "s", "q", t(0))])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(1)));
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
