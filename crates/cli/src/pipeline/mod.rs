//! Submission pipeline: input → checkpoint filter → dispatcher → checkpoint,
//! and the streaming intake that feeds the batch accumulator.

mod input;
mod orchestrator;
mod report;
mod stream;

pub use input::{parse_records, read_records};
pub use orchestrator::{SubmitPipeline, shutdown_signal};
pub use report::SubmitReport;
pub use stream::{feed_lines, StreamReport};
