//! Bounded worker pool for one batch.
//!
//! [`WorkerPool::dispatch`] spawns one task per job onto a [`JoinSet`];
//! a [`Semaphore`] sized to the pool lets at most `pool_size` of them
//! talk to the engine at once. Outcomes stream back over an
//! [`mpsc`] channel in completion order.
//!
//! Each batch carries its own [`CancellationToken`]. Cancelling it drops
//! every in-flight engine call, so work abandoned at the batch deadline
//! does not keep running into the next batch.

use std::sync::Arc;

use chrono::Utc;
use promptq_core::job::Job;
use promptq_core::template::PromptTemplate;
use promptq_core::timestamp::truncate_millis;
use promptq_engine::{GenerationEngine, GenerationParams};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::outcome::{FailureKind, JobOutcome};

/// Everything a worker needs to turn a job into an outcome.
#[derive(Clone)]
struct Worker {
    engine: Arc<dyn GenerationEngine>,
    template: Arc<PromptTemplate>,
    params: Arc<GenerationParams>,
}

impl Worker {
    /// Render, generate, and package the result. Never fails: every
    /// error becomes a [`JobOutcome::Failed`].
    async fn process(&self, job: &Job) -> JobOutcome {
        if let Err(e) = job.validate_inputs() {
            tracing::error!(job_id = job.id, error = %e, "Rejecting malformed job");
            return JobOutcome::Failed {
                id: job.id,
                kind: FailureKind::Malformed(e.to_string()),
            };
        }

        let prompt = self.template.render(&job.system, &job.question);

        match self.engine.generate(&prompt, &self.params).await {
            Ok(text) if text.trim().is_empty() => {
                tracing::error!(job_id = job.id, "Engine returned empty text");
                JobOutcome::Failed {
                    id: job.id,
                    kind: FailureKind::EmptyOutput,
                }
            }
            Ok(text) => {
                let now = truncate_millis(Utc::now());
                // Never report completion before the claim time, even if
                // the wall clock stepped backwards.
                let completed_at = job.time_started.map_or(now, |started| now.max(started));
                tracing::debug!(job_id = job.id, response_len = text.len(), "Job generated");
                JobOutcome::Succeeded {
                    id: job.id,
                    response: text,
                    completed_at,
                }
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Error processing job");
                JobOutcome::Failed {
                    id: job.id,
                    kind: FailureKind::Engine(e.to_string()),
                }
            }
        }
    }
}

/// Spawns bounded batches of workers against one engine and template.
pub struct WorkerPool {
    worker: Worker,
    pool_size: usize,
}

impl WorkerPool {
    /// `pool_size` is clamped to at least one.
    pub fn new(
        engine: Arc<dyn GenerationEngine>,
        template: Arc<PromptTemplate>,
        params: GenerationParams,
        pool_size: usize,
    ) -> Self {
        Self {
            worker: Worker {
                engine,
                template,
                params: Arc::new(params),
            },
            pool_size: pool_size.max(1),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Start processing `jobs`. Must be called from within a tokio
    /// runtime.
    pub fn dispatch(&self, jobs: Vec<Job>) -> DispatchedBatch {
        let cancel = CancellationToken::new();
        let permits = Arc::new(Semaphore::new(self.pool_size));
        // One slot per job so a finished worker never waits on the
        // collector.
        let (tx, outcomes) = mpsc::channel(jobs.len().max(1));
        let mut tasks = JoinSet::new();

        for job in jobs {
            let worker = self.worker.clone();
            let permits = Arc::clone(&permits);
            let tx = tx.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let job_id = job.id;
                let run = async {
                    let _permit = permits.acquire().await.ok()?;
                    Some(worker.process(&job).await)
                };

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(job_id, "Worker cancelled");
                        true
                    }
                    outcome = run => {
                        if let Some(outcome) = outcome {
                            // The collector may already have given up on this batch.
                            let _ = tx.send(outcome).await;
                        }
                        false
                    }
                }
            });
        }

        DispatchedBatch {
            outcomes,
            tasks,
            cancel,
        }
    }
}

/// A batch in flight: the outcome stream plus the handles needed to stop
/// whatever is still running.
pub struct DispatchedBatch {
    pub outcomes: mpsc::Receiver<JobOutcome>,
    tasks: JoinSet<bool>,
    cancel: CancellationToken,
}

impl DispatchedBatch {
    /// Token cancelled when the batch is shut down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel any still-running workers and wait for every task to exit.
    ///
    /// Returns how many workers had to be cancelled.
    pub async fn shutdown(mut self) -> usize {
        self.cancel.cancel();
        self.outcomes.close();

        let mut cancelled = 0;
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(true) => cancelled += 1,
                Ok(false) => {}
                Err(e) if e.is_panic() => {
                    tracing::error!(error = %e, "Worker task panicked");
                }
                Err(_) => {}
            }
        }

        cancelled
    }
}
