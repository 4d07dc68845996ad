//! Stream intake: JSON lines → accumulator.

use anyhow::{Context, Result};
use contracts::{CancellationToken, LogRecord, WorkItem};
use dispatcher::{AccumulatorSnapshot, BatchAccumulator};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Counters for one stream run
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamReport {
    /// Lines that were not a log record
    pub malformed_lines: usize,
    /// Records that could not be turned into work items
    pub rejected_records: usize,
    /// Set when the stream was stopped by a signal
    pub cancelled: bool,
    #[serde(flatten)]
    pub accumulator: AccumulatorSnapshot,
}

impl StreamReport {
    /// Whether every accepted item reached the sink
    pub fn success(&self) -> bool {
        !self.cancelled && self.accumulator.failed_items == 0 && self.accumulator.dropped == 0
    }

    /// Print a human-readable summary
    pub fn print_summary(&self) {
        println!();
        println!("Stream summary:");
        println!("  Received:  {}", self.accumulator.received);
        println!("  Flushes:   {}", self.accumulator.flushes);
        println!("  Dropped:   {}", self.accumulator.dropped);
        println!("  Failed:    {}", self.accumulator.failed_items);
        println!("  Rejected:  {}", self.rejected_records);
        println!("  Malformed: {}", self.malformed_lines);
        if self.cancelled {
            println!("  Stopped by signal");
        }
    }
}

/// Feed newline-delimited records from `reader` into `accumulator` until
/// end of input or `cancel` fires. Blank lines are ignored.
pub async fn feed_lines<R>(
    reader: R,
    accumulator: &BatchAccumulator,
    fallback_recipient: &str,
    cancel: &CancellationToken,
) -> Result<StreamReport>
where
    R: AsyncBufRead + Unpin,
{
    let mut report = StreamReport::default();
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                break;
            }
            line = lines.next_line() => line.context("Failed to read input stream")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let record: LogRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Skipping malformed line");
                report.malformed_lines += 1;
                continue;
            }
        };
        match WorkItem::from_record(&record, fallback_recipient) {
            Ok(item) => accumulator
                .push(item)
                .context("Accumulator stopped before end of input")?,
            Err(e) => {
                warn!(log_id = %record.log_id, error = %e, "Record rejected");
                report.rejected_records += 1;
            }
        }
    }

    debug!(
        malformed = report.malformed_lines,
        rejected = report.rejected_records,
        "Input stream finished"
    );
    Ok(report)
}
