//! LogSink - logs chunk summaries via tracing

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{BatchSink, CallId, CancellationToken, ContractError, WorkItem};
use tracing::{info, instrument};

/// Sink that logs chunk summaries instead of calling a remote system
pub struct LogSink {
    name: String,
    calls: AtomicU64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicU64::new(0),
        }
    }

    fn log_chunk_summary(&self, call_id: &CallId, chunk: &[WorkItem]) {
        let first = chunk.first().map(|item| item.log_id.as_str());
        let last = chunk.last().map(|item| item.log_id.as_str());

        info!(
            sink = %self.name,
            call_id = %call_id,
            items = chunk.len(),
            first_log_id = ?first,
            last_log_id = ?last,
            "Chunk received"
        );
    }
}

impl BatchSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_call",
        skip(self, chunk, cancel),
        fields(sink = %self.name, chunk_len = chunk.len())
    )]
    async fn call(
        &self,
        chunk: &[WorkItem],
        cancel: &CancellationToken,
    ) -> Result<CallId, ContractError> {
        if cancel.is_cancelled() {
            return Err(ContractError::cancelled(&self.name));
        }

        let seq = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let call_id = CallId::from(format!("log-{seq}"));
        self.log_chunk_summary(&call_id, chunk);
        Ok(call_id)
    }
}
