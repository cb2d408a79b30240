//! The `seed` subcommand.

use std::path::{Path, PathBuf};

use chrono::Utc;
use promptq_core::job::Job;
use promptq_core::seed;
use promptq_core::timestamp::truncate_millis;
use promptq_db::store::JobStore;

use crate::config::SeedArgs;
use crate::error::WorkerError;

/// What a seed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedResult {
    /// Jobs were written to a file.
    Written { path: PathBuf, count: usize },
    /// Jobs were inserted into an empty table.
    Inserted(u64),
    /// The table already held jobs; nothing was inserted.
    Skipped { existing: i64 },
}

/// The jobs a seed run would write: loaded from `--from` or generated.
///
/// Loaded records must satisfy [`Job::check_invariants`].
pub fn source_jobs(args: &SeedArgs) -> Result<Vec<Job>, WorkerError> {
    match &args.from {
        Some(path) => {
            let jobs = seed::read_file(path)?;
            for job in &jobs {
                job.check_invariants().map_err(WorkerError::SeedRecord)?;
            }
            Ok(jobs)
        }
        // Spread over the past day so every job is older than its claim.
        None => Ok(seed::generate(
            args.count,
            1,
            truncate_millis(Utc::now() - chrono::Duration::days(1)),
            &mut rand::rng(),
        )),
    }
}

pub fn write_out(path: &Path, jobs: &[Job]) -> Result<SeedResult, WorkerError> {
    seed::write_file(path, jobs)?;
    tracing::info!(count = jobs.len(), path = %path.display(), "Wrote seed file");
    Ok(SeedResult::Written {
        path: path.to_path_buf(),
        count: jobs.len(),
    })
}

/// Insert `jobs` only when the store holds none.
pub async fn insert_if_empty(store: &dyn JobStore, jobs: &[Job]) -> Result<SeedResult, WorkerError> {
    let existing = store.count().await?;
    if existing > 0 {
        tracing::info!(existing, "Jobs table is not empty; skipping seed");
        return Ok(SeedResult::Skipped { existing });
    }

    let inserted = store.insert_many(jobs).await?;
    tracing::info!(inserted, "Seeded jobs table");
    Ok(SeedResult::Inserted(inserted))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use promptq_core::job::JobStatus;
    use promptq_db::memory::MemoryJobStore;

    use super::*;

    fn args(count: usize) -> SeedArgs {
        SeedArgs {
            count,
            from: None,
            out: None,
        }
    }

    #[tokio::test]
    async fn seeds_an_empty_store() {
        let store = MemoryJobStore::new();
        let jobs = source_jobs(&args(25)).unwrap();
        let result = insert_if_empty(&store, &jobs).await.unwrap();

        assert_eq!(result, SeedResult::Inserted(25));
        let stored = store.snapshot().await;
        assert_eq!(stored.len(), 25);
        assert!(stored.iter().all(|job| job.status == JobStatus::New));
        assert_eq!(stored.first().map(|job| job.id), Some(1));
    }

    #[tokio::test]
    async fn leaves_a_populated_store_alone() {
        let store = MemoryJobStore::with_jobs([Job::new(1, "s", "q", Utc::now())]);
        let jobs = source_jobs(&args(10)).unwrap();
        let result = insert_if_empty(&store, &jobs).await.unwrap();

        assert_eq!(result, SeedResult::Skipped { existing: 1 });
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn out_then_from_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");

        let written = write_out(&path, &source_jobs(&args(4)).unwrap()).unwrap();
        assert_matches!(written, SeedResult::Written { count: 4, .. });

        let loaded = source_jobs(&SeedArgs {
            from: Some(path),
            ..args(0)
        })
        .unwrap();
        let store = MemoryJobStore::new();
        assert_eq!(
            insert_if_empty(&store, &loaded).await.unwrap(),
            SeedResult::Inserted(4)
        );
    }

    #[test]
    fn from_file_rejects_records_breaking_invariants() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(
            &path,
            r#"[{
                "id": 1,
                "system": "Continue the tale",
                "question": "Once upon a time in a castle",
                "status": "processed",
                "response": "",
                "time_added": "2024-05-01T08:00:00.000Z",
                "time_started": "2024-05-01T08:00:01.000Z",
                "time_completed": "2024-05-01T08:00:02.000Z"
            }]"#,
        )
        .unwrap();

        let err = source_jobs(&SeedArgs {
            from: Some(path),
            ..args(0)
        })
        .unwrap_err();
        assert_matches!(err, WorkerError::SeedRecord(_));
    }

    #[test]
    fn missing_from_file_is_an_error() {
        let err = source_jobs(&SeedArgs {
            from: Some("/nonexistent/jobs.json".into()),
            ..args(0)
        })
        .unwrap_err();
        assert_matches!(err, WorkerError::Seed(_));
    }
}
