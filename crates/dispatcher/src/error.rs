//! Dispatcher error types

use thiserror::Error;

use crate::submission::SubmissionResult;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Configuration rejected at construction
    #[error("invalid configuration '{field}': {message}")]
    InvalidConfiguration { field: String, message: String },

    /// Caller cancelled while waiting on the rate gate or inside a sink call
    #[error("submission cancelled")]
    Cancelled,

    /// The sink call for a chunk failed
    #[error("sink call for chunk {chunk_index} failed: {source}")]
    SinkFailure {
        chunk_index: usize,
        #[source]
        source: contracts::ContractError,
    },

    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Submission worker is gone
    #[error("submission worker closed")]
    WorkerClosed,
}

impl DispatchError {
    /// Create an invalid configuration error
    pub fn invalid_configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Index of the failing chunk, for sink failures
    pub fn failed_chunk(&self) -> Option<usize> {
        match self {
            Self::SinkFailure { chunk_index, .. } => Some(*chunk_index),
            _ => None,
        }
    }
}

/// A submission that stopped before every chunk was committed.
///
/// `partial` reports what reached the sink; those chunks stay committed.
#[derive(Debug, Error)]
#[error(
    "submission stopped after {} of {} chunks: {error}",
    partial.committed_chunks,
    partial.total_chunks
)]
pub struct SubmitError {
    /// Progress made before the stop
    pub partial: SubmissionResult,
    /// Why the submission stopped
    #[source]
    pub error: DispatchError,
}

impl SubmitError {
    /// Wrap an error with the progress made so far
    pub fn new(partial: SubmissionResult, error: DispatchError) -> Self {
        Self { partial, error }
    }

    /// Whether the stop was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, DispatchError::Cancelled)
    }
}
