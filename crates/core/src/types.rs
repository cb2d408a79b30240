/// Job primary keys are PostgreSQL BIGINT.
pub type JobId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
