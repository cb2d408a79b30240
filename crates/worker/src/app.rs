//! Process-level wiring: build the store, engine, and pool from a
//! [`WorkerConfig`] and run a subcommand.

use std::sync::Arc;

use promptq_core::template::PromptTemplate;
use promptq_db::store::PgJobStore;
use promptq_engine::HttpGenerationEngine;

use crate::config::{SeedArgs, WorkerConfig};
use crate::error::WorkerError;
use crate::orchestrator::{Orchestrator, RunSummary};
use crate::pool::WorkerPool;
use crate::seed::{self, SeedResult};

/// Connect to PostgreSQL and make sure the jobs table exists.
pub async fn open_store(config: &WorkerConfig) -> Result<PgJobStore, WorkerError> {
    let options = promptq_db::connect_options(&config.database_url, config.db_name.as_deref())?;
    let pool = promptq_db::create_pool(options).await?;
    tracing::info!("Database connection pool created");

    promptq_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    let store = PgJobStore::connect(pool, config.table.clone()).await?;
    tracing::info!(table = %config.table, "Jobs table ready");
    Ok(store)
}

/// Load the prompt template. An unreadable template is fatal.
pub fn load_template(config: &WorkerConfig) -> Result<PromptTemplate, WorkerError> {
    let template = PromptTemplate::load(&config.template_path)?;
    if !template.has_placeholders() {
        tracing::warn!(
            path = %config.template_path.display(),
            "Template has no placeholders; every job will get the same prompt"
        );
    }
    Ok(template)
}

/// Drain the queue.
pub async fn run_worker(config: &WorkerConfig) -> Result<RunSummary, WorkerError> {
    let template = load_template(config)?;
    let store = open_store(config).await?;

    let engine = HttpGenerationEngine::new(config.engine_url.clone());
    tracing::info!(
        engine_url = engine.api_url(),
        model = %config.generation.model,
        batch_size = config.batch_size,
        pool_size = config.pool_size,
        timeout_secs = config.batch_timeout.as_secs(),
        "Worker starting"
    );

    let pool = WorkerPool::new(
        Arc::new(engine),
        Arc::new(template),
        config.generation.clone(),
        config.pool_size,
    );
    let mut orchestrator = Orchestrator::new(
        Arc::new(store.clone()),
        pool,
        config.batch_settings(),
    );

    let result = orchestrator.run().await;
    store.close().await;

    let summary = result?;
    tracing::info!(
        batches = summary.batches,
        succeeded = summary.succeeded,
        failed = summary.failed,
        timed_out = summary.timed_out,
        released = summary.released,
        "All done"
    );
    Ok(summary)
}

/// Populate the jobs table or write a seed file.
pub async fn run_seed(config: &WorkerConfig, args: &SeedArgs) -> Result<SeedResult, WorkerError> {
    let jobs = seed::source_jobs(args)?;

    if let Some(path) = &args.out {
        return seed::write_out(path, &jobs);
    }

    let store = open_store(config).await?;
    let result = seed::insert_if_empty(&store, &jobs).await;
    store.close().await;
    result
}
