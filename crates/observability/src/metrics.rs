//! Submission metrics
//!
//! Prometheus series for submissions and record intake, recorded through the
//! `metrics` facade.

use metrics::{counter, gauge, histogram};

/// Outcome of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Every chunk committed
    Completed,
    /// A sink call failed
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl SubmissionStatus {
    /// Label value
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Counts for one finished submission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmissionSample {
    pub status: SubmissionStatus,
    pub committed_chunks: usize,
    pub total_chunks: usize,
    pub committed_items: usize,
    /// Wall time of the whole submission, in seconds
    pub duration_secs: f64,
}

/// Record a finished submission
pub fn record_submission(sink_name: &str, sample: &SubmissionSample) {
    counter!(
        "log_anchor_submissions_total",
        "sink" => sink_name.to_string(),
        "status" => sample.status.as_str()
    )
    .increment(1);

    counter!("log_anchor_chunks_committed_total", "sink" => sink_name.to_string())
        .increment(sample.committed_chunks as u64);
    counter!("log_anchor_items_committed_total", "sink" => sink_name.to_string())
        .increment(sample.committed_items as u64);

    let uncommitted = sample.total_chunks.saturating_sub(sample.committed_chunks);
    if uncommitted > 0 {
        counter!("log_anchor_chunks_abandoned_total", "sink" => sink_name.to_string())
            .increment(uncommitted as u64);
    }

    histogram!("log_anchor_submission_duration_seconds").record(sample.duration_secs);
}

/// Record input records skipped as already covered by the checkpoint
pub fn record_records_skipped(count: usize) {
    if count > 0 {
        counter!("log_anchor_records_skipped_total").increment(count as u64);
    }
}

/// Record input records rejected before submission
pub fn record_records_rejected(count: usize) {
    if count > 0 {
        counter!("log_anchor_records_rejected_total").increment(count as u64);
    }
}

/// Record items dropped by a full accumulator queue
pub fn record_records_dropped(count: usize) {
    if count > 0 {
        counter!("log_anchor_records_dropped_total").increment(count as u64);
    }
}

/// Record a saved checkpoint
pub fn record_checkpoint_saved(unix_secs: i64) {
    counter!("log_anchor_checkpoints_saved_total").increment(1);
    gauge!("log_anchor_checkpoint_updated_at_seconds").set(unix_secs as f64);
}
