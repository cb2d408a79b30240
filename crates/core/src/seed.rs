//! Synthetic job records for local testing.
//!
//! Produces jobs shaped like real traffic (`system = "Continue the tale"`,
//! a short story opener as the question) and reads/writes them as a JSON
//! array in the persisted record schema.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::job::Job;
use crate::timestamp::truncate_millis;
use crate::types::{JobId, Timestamp};

/// System text used for every synthetic job.
pub const SEED_SYSTEM: &str = "Continue the tale";

/// Places substituted into the synthetic story opener.
pub const LOCATIONS: [&str; 10] = [
    "house", "castle", "barn", "forest", "mountain", "village", "city", "cave", "river", "lake",
];

/// `time_added` is spread over this many seconds after the base time.
const ADDED_SPREAD_SECS: i64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to access seed file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid seed file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Generate `count` new jobs with ids `first_id..first_id + count`.
pub fn generate<R: Rng>(
    count: usize,
    first_id: JobId,
    base: Timestamp,
    rng: &mut R,
) -> Vec<Job> {
    (0..count)
        .map(|offset| {
            let location = LOCATIONS[rng.random_range(0..LOCATIONS.len())];
            let added = base + chrono::Duration::seconds(rng.random_range(0..=ADDED_SPREAD_SECS));
            Job::new(
                first_id + offset as JobId,
                SEED_SYSTEM,
                format!("Once upon a time in a {location}"),
                truncate_millis(added),
            )
        })
        .collect()
}

/// Read a JSON array of job records.
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<Job>, SeedError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SeedError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write jobs as a pretty-printed JSON array.
pub fn write_file(path: impl AsRef<Path>, jobs: &[Job]) -> Result<(), SeedError> {
    let path = path.as_ref();
    let raw = serde_json::to_string_pretty(jobs).map_err(|source| SeedError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, raw).map_err(|source| SeedError::Io {
        path: path.to_path_buf(),
        source,
    })
}
