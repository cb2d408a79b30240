//! Row mapping for the jobs table.

use promptq_core::error::CoreError;
use promptq_core::job::Job;
use promptq_core::types::{JobId, Timestamp};
use sqlx::FromRow;

/// A row from the jobs table, with `status` still in its text form.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: JobId,
    pub system: String,
    pub question: String,
    pub status: String,
    pub response: String,
    pub time_added: Timestamp,
    pub time_started: Option<Timestamp>,
    pub time_completed: Option<Timestamp>,
}

impl TryFrom<JobRow> for Job {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            system: row.system,
            question: row.question,
            status: row.status.parse()?,
            response: row.response,
            time_added: row.time_added,
            time_started: row.time_started,
            time_completed: row.time_completed,
        })
    }
}
