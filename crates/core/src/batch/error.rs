//! Error types for the batch module.

use thiserror::Error;

/// Errors raised while collecting results.
///
/// These indicate a scheduling bug, not a job failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    #[error("result index {index} out of range for batch of {total}")]
    OutOfRange { index: usize, total: usize },

    #[error("result for index {index} recorded twice")]
    Duplicate { index: usize },

    #[error("batch incomplete: {recorded} of {total} results recorded")]
    Incomplete { recorded: usize, total: usize },
}

/// Errors that escape the batch boundary.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Malformed batch input, rejected before scheduling.
    #[error("Invalid batch: {0}")]
    Validation(String),

    #[error("Result collection failed: {0}")]
    Collector(#[from] CollectorError),
}

impl BatchError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Whether this error was caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
