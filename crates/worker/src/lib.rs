//! `promptq-worker` library crate.
//!
//! Drains the jobs table batch by batch: claim up to `batch_size` new
//! jobs, run them through the generation engine on a bounded worker
//! pool, commit results under a batch deadline, repeat until nothing is
//! left. The binary entrypoint lives in `main.rs`.

pub mod app;
pub mod claimer;
pub mod collector;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod pool;
pub mod seed;
pub mod telemetry;
