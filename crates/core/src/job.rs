//! Job record and status lifecycle.
//!
//! A job moves `new → claimed` when a batch claims it, then at most once
//! more to `processed` or `failed`. It is never deleted by the worker.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::timestamp;
use crate::types::{JobId, Timestamp};

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $val)] $variant ),+
        }

        impl $name {
            /// All variants, in lifecycle order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the persisted string form.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $val ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $val => Ok($name::$variant), )+
                    other => Err(CoreError::UnknownStatus(other.to_string())),
                }
            }
        }
    };
}

define_status_enum! {
    /// Job processing status as stored in the `status` column.
    JobStatus {
        /// Waiting to be claimed.
        New = "new",
        /// Owned by a running batch.
        Claimed = "claimed",
        /// Generated successfully; `response` is set.
        Processed = "processed",
        /// Gave up on; `response` stays empty.
        Failed = "failed",
    }
}

impl JobStatus {
    /// Whether no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Processed | JobStatus::Failed)
    }
}

/// A queued generation request.
///
/// Serializes to the persisted record schema: timestamps are ISO-8601
/// millisecond strings and unset timestamps are `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(alias = "_id")]
    pub id: JobId,
    pub system: String,
    pub question: String,
    pub status: JobStatus,
    #[serde(default)]
    pub response: String,
    #[serde(with = "timestamp::millis")]
    pub time_added: Timestamp,
    #[serde(with = "timestamp::millis_or_empty", default)]
    pub time_started: Option<Timestamp>,
    #[serde(with = "timestamp::millis_or_empty", default)]
    pub time_completed: Option<Timestamp>,
}

impl Job {
    /// Create a fresh job in the `new` state.
    pub fn new(
        id: JobId,
        system: impl Into<String>,
        question: impl Into<String>,
        time_added: Timestamp,
    ) -> Self {
        Self {
            id,
            system: system.into(),
            question: question.into(),
            status: JobStatus::New,
            response: String::new(),
            time_added,
            time_started: None,
            time_completed: None,
        }
    }

    /// Check that the job carries something to generate from.
    ///
    /// A job whose `system` and `question` are both blank is malformed:
    /// rendering it would hand the engine nothing but template scaffolding.
    pub fn validate_inputs(&self) -> Result<(), CoreError> {
        if self.system.trim().is_empty() && self.question.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "job {} has empty system and question text",
                self.id
            )));
        }
        Ok(())
    }

    /// Check the record-level invariants: `response` is non-empty exactly
    /// when the job is processed, and timestamps never go backwards.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        let processed = self.status == JobStatus::Processed;
        if processed == self.response.is_empty() {
            return Err(CoreError::Validation(format!(
                "job {} has status {} but its response is {}",
                self.id,
                self.status,
                if self.response.is_empty() { "empty" } else { "set" }
            )));
        }

        if let Some(started) = self.time_started {
            if started < self.time_added {
                return Err(CoreError::Validation(format!(
                    "job {} started before it was added",
                    self.id
                )));
            }
            if let Some(completed) = self.time_completed {
                if completed < started {
                    return Err(CoreError::Validation(format!(
                        "job {} completed before it started",
                        self.id
                    )));
                }
            }
        } else if self.time_completed.is_some() {
            return Err(CoreError::Validation(format!(
                "job {} completed without starting",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;

    fn added() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "pending".parse::<JobStatus>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownStatus(s) if s == "pending"));
    }

    #[test]
    fn only_processed_and_failed_are_terminal() {
        assert!(!JobStatus::New.is_terminal());
        assert!(!JobStatus::Claimed.is_terminal());
        assert!(JobStatus::Processed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn new_job_serializes_to_record_schema() {
        let job = Job::new(7, "Continue the tale", "Once upon a time in a barn", added());
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["id"], 7);
        assert_eq!(value["status"], "new");
        assert_eq!(value["response"], "");
        assert_eq!(value["time_added"], "2024-05-01T12:00:00.000Z");
        assert_eq!(value["time_started"], "");
        assert_eq!(value["time_completed"], "");
    }

    #[test]
    fn deserializes_records_keyed_by_underscore_id() {
        let raw = r#"{
            "_id": 3,
            "system": "Continue the tale",
            "question": "Once upon a time in a cave",
            "status": "new",
            "response": "",
            "time_added": "2024-05-01T08:30:00.250Z",
            "time_started": "",
            "time_completed": ""
        }"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.id, 3);
        assert_eq!(job.status, JobStatus::New);
        assert_eq!(job.time_started, None);
        assert_eq!(job.time_added.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn blank_inputs_are_malformed() {
        let job = Job::new(1, "  ", "", added());
        assert!(job.validate_inputs().is_err());

        let job = Job::new(1, "", "Once upon a time", added());
        assert!(job.validate_inputs().is_ok());
    }

    #[test]
    fn processed_requires_response() {
        let mut job = Job::new(1, "s", "q", added());
        job.status = JobStatus::Processed;
        job.time_started = Some(added());
        job.time_completed = Some(added());
        assert!(job.check_invariants().is_err());

        job.response = "The end.".into();
        assert!(job.check_invariants().is_ok());
    }

    #[test]
    fn response_on_unprocessed_job_is_invalid() {
        let mut job = Job::new(1, "s", "q", added());
        job.response = "stray".into();
        assert!(job.check_invariants().is_err());
    }

    #[test]
    fn completion_before_start_is_invalid() {
        let mut job = Job::new(1, "s", "q", added());
        job.status = JobStatus::Processed;
        job.response = "x".into();
        job.time_started = Some(added() + chrono::Duration::seconds(5));
        job.time_completed = Some(added() + chrono::Duration::seconds(1));
        assert!(job.check_invariants().is_err());
    }
}
