//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Delivery Model
//! - A `WorkItem` is immutable once built and is delivered by exactly one sink call
//! - A `BatchSink` performs one remote call per chunk and returns a `CallId`
//! - A `CheckpointStore` remembers the last position committed downstream

mod call_id;
mod checkpoint;
mod config;
mod error;
mod record;
mod sink;

pub use call_id::CallId;
pub use checkpoint::*;
pub use config::*;
pub use error::*;
pub use record::*;
pub use sink::*;

pub use tokio_util::sync::CancellationToken;
