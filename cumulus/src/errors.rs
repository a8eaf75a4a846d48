use chrono::NaiveDate;
use thiserror::Error as ThisError;

use crate::image::{ImageKey, ImageStatus};
use crate::usage::concurrent::DailyConcurrentUsage;

/// Result type for cumulus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the metering core.
///
/// Every error is surfaced to the caller; nothing is swallowed. Only
/// [`Error::Timeout`] is retryable, see [`Error::is_retryable`].
#[derive(Debug, ThisError)]
pub enum Error {
    /// Status change violates forward-only ordering or touches a terminal state.
    #[error("invalid status transition for {key}: {from} -> {to}")]
    InvalidTransition {
        key: ImageKey,
        from: ImageStatus,
        to: ImageStatus,
    },

    /// Operation requires a different lifecycle status (e.g. detection results
    /// may only be recorded while the image is being inspected).
    #[error("cannot {operation} while image {key} is {status}")]
    InvalidState {
        key: ImageKey,
        status: ImageStatus,
        operation: &'static str,
    },

    /// Malformed report range: start must be strictly before end, and the
    /// span must not exceed the configured maximum.
    #[error("invalid date range {start} to {end}: {reason}")]
    InvalidRange {
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    },

    /// Aggregation exceeded its deadline. Carries the days completed so far
    /// so the caller can persist progress and resume from `resume_from`;
    /// partial results are never returned on the success path.
    #[error("usage aggregation deadline exceeded after {} completed day(s); resume from {resume_from}", completed.len())]
    Timeout {
        completed: Vec<DailyConcurrentUsage>,
        resume_from: NaiveDate,
    },

    /// Image not found in the store.
    #[error("image {0} not found")]
    NotFound(ImageKey),

    /// Image already registered under this key.
    #[error("image {0} already exists")]
    AlreadyExists(ImageKey),

    /// Unexpected error with full context chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the caller may retry the failed operation. Timeouts are the
    /// only retryable kind: the day-by-day decomposition lets the caller
    /// resume from the last completed day.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
