//! # Dispatcher
//!
//! Rate-limited batch delivery.
//!
//! Responsibilities:
//! - Split a submission into bounded chunks
//! - Keep consecutive sink calls at least `min_interval` apart
//! - Stop at the first failure and report how far the submission got
//! - Collect a stream of items into batches by size or timeout

pub mod accumulator;
pub mod checkpoint;
pub mod chunker;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod rate_gate;
pub mod sinks;
pub mod submission;

pub use accumulator::{AccumulatorConfig, AccumulatorSnapshot, AccumulatorStats, BatchAccumulator};
pub use checkpoint::{AnyCheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use chunker::{chunk, chunk_count, BatchSize};
pub use contracts::{BatchSink, WorkItem};
pub use dispatcher::{create_dispatcher, create_sink, Dispatcher, DispatcherConfig};
pub use error::{DispatchError, SubmitError};
pub use handle::SubmitHandle;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use rate_gate::RateGate;
pub use sinks::{AnySink, FileSink, LogSink, NetworkSink};
pub use submission::SubmissionResult;
