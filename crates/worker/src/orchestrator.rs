//! The claim / dispatch / collect loop.
//!
//! One [`Orchestrator::step`] is one batch:
//!
//! 1. on the first step only, optionally return stale claims left by
//!    earlier runs to `new`,
//! 2. claim up to `batch_size` jobs (none left means the run is done),
//! 3. dispatch them to the [`WorkerPool`],
//! 4. collect and commit outcomes until the batch deadline,
//! 5. cancel and join whatever is still running.
//!
//! Step 5 runs before the next claim, so batches never overlap.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use promptq_core::types::JobId;
use promptq_db::store::JobStore;
use tokio::time::Instant;

use crate::claimer::BatchClaimer;
use crate::collector::{BatchCollector, CollectionReport};
use crate::error::WorkerError;
use crate::pool::WorkerPool;

/// Settings that shape each batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub pool_size: usize,
    pub batch_timeout: Duration,
    pub fail_on_error: bool,
    pub stale_claim_after: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Running,
    Done,
}

/// Totals across a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: usize,
    pub claimed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub released: u64,
}

impl RunSummary {
    fn absorb(&mut self, report: &CollectionReport) {
        self.batches += 1;
        self.claimed += report.total();
        self.succeeded += report.succeeded;
        self.failed += report.failed;
        self.timed_out += report.timed_out;
    }
}

pub struct Orchestrator {
    claimer: BatchClaimer,
    collector: BatchCollector,
    pool: WorkerPool,
    settings: BatchSettings,
    state: OrchestratorState,
    swept: bool,
    released: u64,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn JobStore>, pool: WorkerPool, settings: BatchSettings) -> Self {
        Self {
            claimer: BatchClaimer::new(Arc::clone(&store)),
            collector: BatchCollector::new(store, settings.fail_on_error),
            pool,
            settings,
            state: OrchestratorState::Running,
            swept: false,
            released: 0,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Run one batch. Returns `None` once the queue is drained.
    ///
    /// Store errors while claiming are fatal; everything after the claim
    /// is handled per job.
    pub async fn step(&mut self) -> Result<Option<CollectionReport>, WorkerError> {
        if self.state == OrchestratorState::Done {
            return Ok(None);
        }

        // Once per run, so claims this run gave up on are never re-claimed.
        if !self.swept {
            self.swept = true;
            if let Some(age) = self.settings.stale_claim_after {
                self.released += self.claimer.release_stale(age).await?;
            }
        }

        let jobs = self.claimer.claim(self.settings.batch_size).await?;
        if jobs.is_empty() {
            tracing::info!("No new jobs left");
            self.state = OrchestratorState::Done;
            return Ok(None);
        }

        let pending: BTreeSet<JobId> = jobs.iter().map(|job| job.id).collect();
        tracing::info!(job_ids = ?pending, "Processing batch");

        let deadline = Instant::now() + self.settings.batch_timeout;
        let mut batch = self.pool.dispatch(jobs);
        let report = self
            .collector
            .collect(&mut batch.outcomes, pending, deadline)
            .await;

        let cancelled = batch.shutdown().await;
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cancelled unfinished workers");
        }

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            timed_out = report.timed_out,
            "Batch complete"
        );
        Ok(Some(report))
    }

    /// Process batches until no `new` jobs remain.
    pub async fn run(&mut self) -> Result<RunSummary, WorkerError> {
        let mut summary = RunSummary::default();
        while let Some(report) = self.step().await? {
            summary.absorb(&report);
        }
        summary.released = self.released;
        Ok(summary)
    }
}
