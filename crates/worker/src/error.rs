use promptq_core::error::CoreError;
use promptq_core::seed::SeedError;
use promptq_core::template::TemplateError;
use promptq_db::store::StoreError;

use crate::config::ConfigError;

/// Errors that stop the worker process.
///
/// Per-job failures never surface here; they are reported as
/// [`crate::outcome::JobOutcome::Failed`] and handled by the collector.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to connect to the job store: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("job store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error("invalid seed record: {0}")]
    SeedRecord(#[source] CoreError),
}
