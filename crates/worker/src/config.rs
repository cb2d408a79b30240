//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through its environment
//! variable (a `.env` file is loaded first); a flag always wins over the
//! environment. [`CliArgs`] is validated once into an immutable
//! [`WorkerConfig`] that is passed by reference from then on.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use promptq_db::table::{InvalidTableName, TableName, DEFAULT_TABLE};
use promptq_engine::GenerationParams;

use crate::orchestrator::BatchSettings;

/// Default number of synthetic jobs written by `seed`.
pub const DEFAULT_SEED_COUNT: usize = 1000;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "promptq-worker",
    version,
    about = "Drain queued text-generation jobs through a generation engine"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// PostgreSQL connection string.
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/promptq",
        global = true
    )]
    pub database_url: String,

    /// Database name, replacing the one in the connection string.
    ///
    /// Environment variable: `DB_NAME`
    #[arg(long, env = "DB_NAME", global = true)]
    pub db_name: Option<String>,

    /// Table holding the job records.
    ///
    /// Environment variable: `JOBS_TABLE`
    #[arg(long, env = "JOBS_TABLE", default_value = DEFAULT_TABLE, global = true)]
    pub jobs_table: String,

    /// Jobs claimed and dispatched per batch.
    ///
    /// Environment variable: `BATCH_SIZE`
    #[arg(long, env = "BATCH_SIZE", default_value_t = 10, global = true)]
    pub batch_size: usize,

    /// Number of jobs generated concurrently.
    ///
    /// Environment variable: `WORKER_CNT`
    #[arg(long, env = "WORKER_CNT", default_value_t = 5, global = true)]
    pub parallel: usize,

    /// Seconds a whole batch may take before its unfinished jobs are
    /// abandoned in `claimed`.
    ///
    /// Environment variable: `TIMEOUT`
    #[arg(long, env = "TIMEOUT", default_value_t = 15, global = true)]
    pub timeout: u64,

    /// Minimum generated length passed to the engine.
    ///
    /// Environment variable: `MIN_LEN`
    #[arg(long, env = "MIN_LEN", default_value_t = 5, global = true)]
    pub min_len: u32,

    /// Maximum generated length passed to the engine.
    ///
    /// Environment variable: `MAX_LEN`
    #[arg(long, env = "MAX_LEN", default_value_t = 200, global = true)]
    pub max_len: u32,

    /// Model identifier passed to the engine.
    ///
    /// Environment variable: `MODEL_NAME`
    #[arg(
        long,
        env = "MODEL_NAME",
        default_value = "roneneldan/TinyStories-33M",
        global = true
    )]
    pub model: String,

    /// Prompt template file with `{{ system }}` and `{{ question }}`
    /// placeholders.
    ///
    /// Environment variable: `TEMPLATE`
    #[arg(long, env = "TEMPLATE", default_value = "phi3.template", global = true)]
    pub template: PathBuf,

    /// Base URL of the text-generation server.
    ///
    /// Environment variable: `ENGINE_URL`
    #[arg(
        long,
        env = "ENGINE_URL",
        default_value = "http://localhost:8080",
        global = true
    )]
    pub engine_url: String,

    /// Mark jobs whose generation failed as `failed` instead of leaving
    /// them `claimed`.
    ///
    /// Environment variable: `FAIL_ON_ERROR`
    #[arg(long, env = "FAIL_ON_ERROR", global = true)]
    pub fail_on_error: bool,

    /// Before the first claim, return jobs claimed longer than this many
    /// seconds ago to `new`. Disabled when unset.
    ///
    /// Environment variable: `STALE_CLAIM_SECS`
    #[arg(long, env = "STALE_CLAIM_SECS", global = true)]
    pub stale_claim_secs: Option<u64>,

    /// Log output format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Process jobs until none are left (the default).
    Run,
    /// Populate an empty jobs table with synthetic or file-provided jobs.
    Seed(SeedArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SeedArgs {
    /// Number of synthetic jobs to generate.
    #[arg(long, default_value_t = DEFAULT_SEED_COUNT, conflicts_with = "from")]
    pub count: usize,

    /// Load jobs from a JSON file instead of generating them.
    #[arg(long)]
    pub from: Option<PathBuf>,

    /// Write the jobs to this JSON file instead of the database.
    #[arg(long, conflicts_with = "from")]
    pub out: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("BATCH_SIZE must be greater than 0")]
    ZeroBatchSize,

    #[error("WORKER_CNT must be greater than 0")]
    ZeroWorkers,

    #[error("TIMEOUT must be at least 1 second")]
    ZeroTimeout,

    #[error("STALE_CLAIM_SECS must be at least 1 second")]
    ZeroStaleClaim,

    #[error("MIN_LEN ({min}) must not exceed MAX_LEN ({max})")]
    LengthBounds { min: u32, max: u32 },

    #[error(transparent)]
    Table(#[from] InvalidTableName),
}

/// Validated, immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub db_name: Option<String>,
    pub table: TableName,
    pub batch_size: usize,
    pub pool_size: usize,
    pub batch_timeout: Duration,
    pub generation: GenerationParams,
    pub template_path: PathBuf,
    pub engine_url: String,
    pub fail_on_error: bool,
    pub stale_claim_after: Option<Duration>,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// The subset of settings that drives the claim/dispatch/collect loop.
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            batch_size: self.batch_size,
            pool_size: self.pool_size,
            batch_timeout: self.batch_timeout,
            fail_on_error: self.fail_on_error,
            stale_claim_after: self.stale_claim_after,
        }
    }
}

impl TryFrom<CliArgs> for WorkerConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if args.parallel == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if args.timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if args.stale_claim_secs == Some(0) {
            return Err(ConfigError::ZeroStaleClaim);
        }
        if args.min_len > args.max_len {
            return Err(ConfigError::LengthBounds {
                min: args.min_len,
                max: args.max_len,
            });
        }

        Ok(Self {
            database_url: args.database_url,
            db_name: args.db_name.filter(|name| !name.is_empty()),
            table: TableName::new(&args.jobs_table)?,
            batch_size: args.batch_size,
            pool_size: args.parallel,
            batch_timeout: Duration::from_secs(args.timeout),
            generation: GenerationParams {
                model: args.model,
                min_length: args.min_len,
                max_length: args.max_len,
            },
            template_path: args.template,
            engine_url: args.engine_url,
            fail_on_error: args.fail_on_error,
            stale_claim_after: args.stale_claim_secs.map(Duration::from_secs),
            log_format: args.log_format,
        })
    }
}
