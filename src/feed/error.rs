//! Feed error types
//!
//! Failures from the source and judge stay inside the cycle that produced
//! them; only lifecycle misuse and bad window configuration reach callers.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by a [`Source`](super::Source)
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transport-level failure talking to the source
    #[error("Request failed: {0}")]
    Request(String),

    /// The source did not answer in time
    #[error("Source timed out")]
    Timeout,

    /// The source answered with a non-success status
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// The response could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    /// Nothing changed in the requested window
    #[error("No changes since window start")]
    NoChanges,
}

/// Errors returned by a [`Judge`](super::Judge)
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Judge timed out")]
    Timeout,

    #[error("Unexpected status: {0}")]
    Status(u16),

    /// The judge answered without any text
    #[error("Empty response")]
    EmptyResponse,

    #[error("API key not configured")]
    MissingApiKey,
}

/// Errors produced by the refresh pipeline
#[derive(Error, Debug)]
pub enum FeedError {
    /// Fetch failed; the cycle is skipped
    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    /// Judge failed; the sample is kept unannotated
    #[error("Judge unavailable: {0}")]
    JudgeUnavailable(#[from] JudgeError),

    /// Judge exceeded its own budget; the sample is kept unannotated
    #[error("Judge timed out after {0:?}")]
    JudgeTimeout(Duration),

    /// Fetch and judge together exceeded the cycle deadline; the cycle is skipped
    #[error("Cycle timed out after {0:?}")]
    CycleTimeout(Duration),

    /// Window capacities are zero or not nested
    #[error("Invalid windows: {0}")]
    InvalidWindows(String),

    #[error("Pipeline already started")]
    AlreadyStarted,

    #[error("Pipeline is not running")]
    NotRunning,

    #[error("Pipeline already stopped")]
    AlreadyStopped,
}

/// Result type alias for feed operations
pub type FeedResult<T> = Result<T, FeedError>;
