//! Error types for the ingestion pipeline

use std::time::Duration;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failures raised while listing, reading, parsing or publishing a file.
///
/// Row- and message-level variants (`RowRejected`, `PublishFailure`) are
/// absorbed by the parser and publisher; the rest end up in a failed
/// [`ProcessingOutcome`](crate::types::ProcessingOutcome).
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Row {row} rejected: {reason}")]
    RowRejected { row: usize, reason: String },

    #[error("Publish failed: {0}")]
    PublishFailure(String),

    #[error("{failed} of {total} messages failed to publish")]
    PartialDelivery { failed: usize, total: usize },

    #[error("{operation} exceeded deadline of {timeout:?}")]
    DeadlineExceeded {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
