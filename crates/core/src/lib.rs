//! Shared data model for the promptq job queue.
//!
//! Holds the job record and its status lifecycle, the ISO-8601 wire
//! format for timestamps, prompt template rendering, and synthetic seed
//! data generation. No I/O beyond reading template and seed files.

pub mod error;
pub mod job;
pub mod seed;
pub mod template;
pub mod timestamp;
pub mod types;
