//! Submission results

use contracts::CallId;
use serde::Serialize;

/// Outcome of one submission, complete or partial
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    /// Id returned by the last successful sink call
    pub last_call_id: Option<CallId>,
    /// Chunks committed to the sink
    pub committed_chunks: usize,
    /// Items contained in the committed chunks
    pub committed_items: usize,
    /// Chunks the submission was split into
    pub total_chunks: usize,
}

impl SubmissionResult {
    /// Result for a submission split into `total_chunks`, nothing committed yet
    pub fn planned(total_chunks: usize) -> Self {
        Self {
            total_chunks,
            ..Self::default()
        }
    }

    /// Record a committed chunk
    pub fn record_commit(&mut self, call_id: CallId, chunk_len: usize) {
        self.last_call_id = Some(call_id);
        self.committed_chunks += 1;
        self.committed_items += chunk_len;
    }
}
