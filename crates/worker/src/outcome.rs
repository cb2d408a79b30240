//! What a worker reports back for one job.
//!
//! Workers never touch the store. They hand the collector a
//! [`JobOutcome`], and the collector decides what to persist by matching
//! on it.

use promptq_core::types::{JobId, Timestamp};

/// Why a job could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureKind {
    /// The job's inputs cannot produce a meaningful prompt.
    #[error("malformed job: {0}")]
    Malformed(String),

    /// The generation engine returned an error.
    #[error("generation failed: {0}")]
    Engine(String),

    /// The engine succeeded but produced only whitespace.
    #[error("generation produced no text")]
    EmptyOutput,
}

/// Result of running one job through render and generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded {
        id: JobId,
        response: String,
        completed_at: Timestamp,
    },
    Failed {
        id: JobId,
        kind: FailureKind,
    },
}

impl JobOutcome {
    pub fn id(&self) -> JobId {
        match self {
            JobOutcome::Succeeded { id, .. } | JobOutcome::Failed { id, .. } => *id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}
