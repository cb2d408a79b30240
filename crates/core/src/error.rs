#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unknown job status: {0:?}")]
    UnknownStatus(String),

    #[error("Invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },
}
