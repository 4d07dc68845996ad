//! BatchSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for the remote system that receives chunks.

use crate::{CallId, CancellationToken, ContractError, WorkItem};

/// Remote call trait
///
/// All sink implementations must implement this trait. A sink performs one
/// remote call per chunk; latency and failure are outside the dispatcher's control.
#[trait_variant::make(BatchSink: Send)]
pub trait LocalBatchSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one chunk of work items
    ///
    /// Implementations should return `ContractError::Cancelled` promptly once
    /// `cancel` fires.
    ///
    /// # Errors
    /// Any error is fatal for the submission the chunk belongs to.
    async fn call(
        &self,
        chunk: &[WorkItem],
        cancel: &CancellationToken,
    ) -> Result<CallId, ContractError>;
}
