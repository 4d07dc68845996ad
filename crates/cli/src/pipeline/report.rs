//! Submission report.

use std::time::Duration;

use dispatcher::{SubmissionResult, SubmitError};
use observability::{SubmissionSample, SubmissionStatus};
use serde::Serialize;

/// Outcome of one `submit` run
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReport {
    pub success: bool,
    pub message: String,
    pub committed_chunks: usize,
    pub committed_items: usize,
    pub total_chunks: usize,
    /// Call id of the last committed chunk
    pub call_id: Option<String>,
    /// Index of the chunk whose sink call failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_chunk: Option<usize>,
    /// Records already covered by the checkpoint
    pub skipped_records: usize,
    /// Records that could not be turned into work items
    pub rejected_records: usize,
    #[serde(skip)]
    pub status: Option<SubmissionStatus>,
    #[serde(skip)]
    pub duration: Duration,
}

impl SubmitReport {
    /// Report for a submission that had nothing to send
    pub fn nothing_to_submit(skipped_records: usize, rejected_records: usize) -> Self {
        Self {
            success: true,
            message: "No new logs to submit".to_string(),
            committed_chunks: 0,
            committed_items: 0,
            total_chunks: 0,
            call_id: None,
            failed_chunk: None,
            skipped_records,
            rejected_records,
            status: None,
            duration: Duration::ZERO,
        }
    }

    /// Report from a dispatcher outcome
    pub fn from_outcome(
        outcome: &Result<SubmissionResult, SubmitError>,
        duration: Duration,
    ) -> Self {
        let (result, status, message, failed_chunk) = match outcome {
            Ok(result) => (
                result,
                SubmissionStatus::Completed,
                format!(
                    "Submitted {} logs in {} chunks",
                    result.committed_items, result.committed_chunks
                ),
                None,
            ),
            Err(e) if e.is_cancelled() => (
                &e.partial,
                SubmissionStatus::Cancelled,
                e.to_string(),
                None,
            ),
            Err(e) => (
                &e.partial,
                SubmissionStatus::Failed,
                e.to_string(),
                e.error.failed_chunk(),
            ),
        };

        Self {
            success: status == SubmissionStatus::Completed,
            message,
            committed_chunks: result.committed_chunks,
            committed_items: result.committed_items,
            total_chunks: result.total_chunks,
            call_id: result.last_call_id.as_ref().map(|id| id.to_string()),
            failed_chunk,
            skipped_records: 0,
            rejected_records: 0,
            status: Some(status),
            duration,
        }
    }

    /// Metrics sample, `None` when nothing was dispatched
    pub fn sample(&self) -> Option<SubmissionSample> {
        self.status.map(|status| SubmissionSample {
            status,
            committed_chunks: self.committed_chunks,
            total_chunks: self.total_chunks,
            committed_items: self.committed_items,
            duration_secs: self.duration.as_secs_f64(),
        })
    }

    /// Print a human-readable summary
    pub fn print_summary(&self) {
        let mark = if self.success { "✓" } else { "✗" };
        println!("\n{} {}\n", mark, self.message);
        println!("  Chunks committed: {}/{}", self.committed_chunks, self.total_chunks);
        println!("  Logs committed: {}", self.committed_items);
        if let Some(ref call_id) = self.call_id {
            println!("  Last call id: {}", call_id);
        }
        if let Some(chunk) = self.failed_chunk {
            println!("  Failed chunk: {}", chunk);
        }
        if self.skipped_records > 0 {
            println!("  Skipped (already checkpointed): {}", self.skipped_records);
        }
        if self.rejected_records > 0 {
            println!("  Rejected records: {}", self.rejected_records);
        }
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CallId, ContractError};
    use dispatcher::DispatchError;

    #[test]
    fn test_report_from_success() {
        let mut result = SubmissionResult::planned(2);
        result.record_commit(CallId::from("tx-1"), 100);
        result.record_commit(CallId::from("tx-2"), 20);

        let report = SubmitReport::from_outcome(&Ok(result), Duration::from_secs(61));
        assert!(report.success);
        assert_eq!(report.call_id.as_deref(), Some("tx-2"));
        assert_eq!(report.committed_items, 120);
        assert_eq!(report.sample().unwrap().status, SubmissionStatus::Completed);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("failed_chunk").is_none());
        assert!(json.get("duration").is_none());
    }

    #[test]
    fn test_report_from_partial_failure() {
        let mut partial = SubmissionResult::planned(3);
        partial.record_commit(CallId::from("tx-1"), 100);
        let error = SubmitError::new(
            partial,
            DispatchError::SinkFailure {
                chunk_index: 1,
                source: ContractError::sink_call("ledger", "reverted"),
            },
        );

        let report = SubmitReport::from_outcome(&Err(error), Duration::from_secs(60));
        assert!(!report.success);
        assert_eq!(report.failed_chunk, Some(1));
        assert_eq!(report.committed_chunks, 1);
        assert_eq!(report.call_id.as_deref(), Some("tx-1"));
        assert!(report.message.contains("1 of 3"), "got: {}", report.message);
    }

    #[test]
    fn test_report_from_cancellation() {
        let error = SubmitError::new(SubmissionResult::planned(2), DispatchError::Cancelled);
        let report = SubmitReport::from_outcome(&Err(error), Duration::ZERO);
        assert!(!report.success);
        assert!(report.failed_chunk.is_none());
        assert_eq!(report.sample().unwrap().status, SubmissionStatus::Cancelled);
    }
}
