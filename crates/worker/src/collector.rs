//! Batch result collection.
//!
//! [`BatchCollector::collect`] waits for outcomes until every dispatched
//! job has reported or the batch deadline passes, committing each result
//! as it arrives. Commits are conditional on the job still being
//! `claimed`, so a late or duplicate outcome can never overwrite a
//! terminal record.
//!
//! Jobs that miss the deadline are left `claimed` with no
//! `time_completed`; they are reported back so the caller can cancel
//! their workers.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use promptq_core::timestamp::truncate_millis;
use promptq_core::types::JobId;
use promptq_db::store::JobStore;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::outcome::{FailureKind, JobOutcome};

/// Tally for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Jobs still outstanding when the deadline passed, in id order.
    pub timed_out_ids: Vec<JobId>,
}

impl CollectionReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.timed_out
    }
}

pub struct BatchCollector {
    store: Arc<dyn JobStore>,
    fail_on_error: bool,
}

impl BatchCollector {
    /// With `fail_on_error` unset, failed jobs stay `claimed`.
    pub fn new(store: Arc<dyn JobStore>, fail_on_error: bool) -> Self {
        Self {
            store,
            fail_on_error,
        }
    }

    /// Receive outcomes for `pending` until all have reported, the
    /// channel closes, or `deadline` passes.
    ///
    /// Never fails: store errors are logged and counted against the job.
    pub async fn collect(
        &self,
        outcomes: &mut mpsc::Receiver<JobOutcome>,
        mut pending: BTreeSet<JobId>,
        deadline: Instant,
    ) -> CollectionReport {
        let mut report = CollectionReport::default();

        while !pending.is_empty() {
            match tokio::time::timeout_at(deadline, outcomes.recv()).await {
                Ok(Some(outcome)) => {
                    let id = outcome.id();
                    if !pending.remove(&id) {
                        tracing::warn!(job_id = id, "Ignoring outcome for a job not in this batch");
                        continue;
                    }
                    if self.commit(outcome).await {
                        report.succeeded += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Ok(None) => {
                    let lost: Vec<JobId> = pending.iter().copied().collect();
                    tracing::error!(job_ids = ?lost, "Workers exited without reporting");
                    report.failed += lost.len();
                    pending.clear();
                }
                Err(_) => {
                    let outstanding: Vec<JobId> = pending.iter().copied().collect();
                    tracing::error!(
                        job_ids = ?outstanding,
                        "Batch timed out; jobs left claimed"
                    );
                    report.timed_out = outstanding.len();
                    report.timed_out_ids = outstanding;
                    pending.clear();
                }
            }
        }

        report
    }

    /// Persist one outcome. Returns `true` only when a success was
    /// committed.
    async fn commit(&self, outcome: JobOutcome) -> bool {
        match outcome {
            JobOutcome::Succeeded {
                id,
                response,
                completed_at,
            } => match self.store.mark_processed(id, &response, completed_at).await {
                Ok(true) => {
                    tracing::debug!(job_id = id, "Job processed");
                    true
                }
                Ok(false) => {
                    tracing::warn!(job_id = id, "Job was no longer claimed; result discarded");
                    false
                }
                Err(e) => {
                    tracing::error!(job_id = id, error = %e, "Failed to store job result");
                    false
                }
            },
            JobOutcome::Failed { id, kind } => {
                self.record_failure(id, &kind).await;
                false
            }
        }
    }

    async fn record_failure(&self, id: JobId, kind: &FailureKind) {
        if !self.fail_on_error {
            tracing::warn!(job_id = id, reason = %kind, "Job failed; left claimed");
            return;
        }

        let completed_at = truncate_millis(Utc::now());
        match self.store.mark_failed(id, completed_at).await {
            Ok(true) => tracing::warn!(job_id = id, reason = %kind, "Job marked failed"),
            Ok(false) => {
                tracing::warn!(job_id = id, "Job was no longer claimed; failure not recorded")
            }
            Err(e) => tracing::error!(job_id = id, error = %e, "Failed to mark job failed"),
        }
    }
}
