//! PostgreSQL tests for `JobRepo` through [`PgJobStore`].
//!
//! Require a running database: set `DATABASE_URL` and run with
//! `cargo test -p promptq-db -- --ignored`.

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use promptq_core::job::{Job, JobStatus};
use promptq_core::types::Timestamp;
use promptq_db::store::{JobStore, PgJobStore, StoreError};
use promptq_db::table::TableName;
use sqlx::PgPool;

fn t(secs: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
}

async fn seeded_store(pool: PgPool, n: i64) -> PgJobStore {
    let store = PgJobStore::connect(pool, TableName::default()).await.unwrap();
    let jobs: Vec<Job> = (1..=n)
        .map(|id| Job::new(id, "Continue the tale", format!("Once upon a time #{id}"), t(0)))
        .collect();
    store.insert_many(&jobs).await.unwrap();
    store
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn ensure_table_is_idempotent(pool: PgPool) {
    let store = PgJobStore::connect(pool.clone(), TableName::default())
        .await
        .unwrap();
    PgJobStore::connect(pool, TableName::default()).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn claim_marks_rows_and_respects_limit(pool: PgPool) {
    let store = seeded_store(pool, 5).await;

    let batch = store.claim_batch(3, t(10)).await.unwrap();
    assert_eq!(batch.len(), 3);
    for job in &batch {
        assert_eq!(job.status, JobStatus::Claimed);
        assert_eq!(job.time_started, Some(t(10)));
    }

    assert_eq!(store.count_by_status(JobStatus::New).await.unwrap(), 2);
    assert_eq!(store.count_by_status(JobStatus::Claimed).await.unwrap(), 3);
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_claims_are_disjoint(pool: PgPool) {
    let store = seeded_store(pool, 20).await;

    let (a, b) = tokio::join!(store.claim_batch(10, t(1)), store.claim_batch(10, t(1)));
    let mut ids: Vec<_> = a
        .unwrap()
        .into_iter()
        .chain(b.unwrap())
        .map(|j| j.id)
        .collect();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total, "a job was claimed twice");
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn processed_transition_is_conditional(pool: PgPool) {
    let store = seeded_store(pool, 1).await;

    assert!(!store.mark_processed(1, "early", t(2)).await.unwrap());

    store.claim_batch(1, t(1)).await.unwrap();
    assert!(store.mark_processed(1, "The end.", t(2)).await.unwrap());
    assert!(!store.mark_failed(1, t(3)).await.unwrap());

    let job = store.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Processed);
    assert_eq!(job.response, "The end.");
    assert_eq!(job.time_completed, Some(t(2)));
    job.check_invariants().unwrap();
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn stale_claims_are_released(pool: PgPool) {
    let store = seeded_store(pool, 2).await;
    store.claim_batch(1, t(0)).await.unwrap();
    store.claim_batch(1, t(100)).await.unwrap();

    assert_eq!(store.release_stale_claims(t(50)).await.unwrap(), 1);
    assert_eq!(store.count_by_status(JobStatus::New).await.unwrap(), 1);
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_ids_fail_the_whole_insert(pool: PgPool) {
    let store = seeded_store(pool, 1).await;
    let err = store
        .insert_many(&[Job::new(2, "s", "q", t(0)), Job::new(1, "s", "q", t(0))])
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Database(_));
    assert_eq!(store.count().await.unwrap(), 1);
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn custom_table_names_are_isolated(pool: PgPool) {
    let table = TableName::new("mongorequests").unwrap();
    let custom = PgJobStore::connect(pool.clone(), table).await.unwrap();
    custom
        .insert_many(&[Job::new(1, "s", "q", t(0))])
        .await
        .unwrap();

    let default = PgJobStore::connect(pool, TableName::default())
        .await
        .unwrap();
    assert_eq!(custom.count().await.unwrap(), 1);
    assert_eq!(default.count().await.unwrap(), 0);
}
