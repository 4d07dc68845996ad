//! Submit pipeline - checkpoint filtering around one dispatcher submission.

use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{BatchSink, CancellationToken, Checkpoint, CheckpointStore, LogRecord, WorkItem};
use dispatcher::Dispatcher;
use tracing::{error, info, warn};

use super::SubmitReport;

/// One-shot submission pipeline
pub struct SubmitPipeline<S, C> {
    dispatcher: Dispatcher<S>,
    store: C,
    fallback_recipient: String,
    use_checkpoint: bool,
}

impl<S, C> SubmitPipeline<S, C>
where
    S: BatchSink + Sync,
    C: CheckpointStore + Sync,
{
    /// Create a pipeline over a dispatcher and a checkpoint store
    pub fn new(dispatcher: Dispatcher<S>, store: C, fallback_recipient: impl Into<String>) -> Self {
        Self {
            dispatcher,
            store,
            fallback_recipient: fallback_recipient.into(),
            use_checkpoint: true,
        }
    }

    /// Submit every record regardless of the stored checkpoint
    pub fn ignore_checkpoint(mut self) -> Self {
        self.use_checkpoint = false;
        self
    }

    /// Run one submission.
    ///
    /// Records covered by the checkpoint are skipped, the rest are submitted
    /// in `(timestamp, log_id)` order. The checkpoint moves to the last committed record,
    /// also when the submission stopped early.
    pub async fn run(
        &self,
        records: Vec<LogRecord>,
        cancel: &CancellationToken,
    ) -> Result<SubmitReport> {
        let checkpoint = if self.use_checkpoint {
            self.store.load().await.context("Failed to load checkpoint")?
        } else {
            None
        };

        let total_records = records.len();
        let (items, skipped, rejected) = self.prepare(records, checkpoint.as_ref());
        observability::record_records_skipped(skipped);
        observability::record_records_rejected(rejected);

        info!(
            total_records,
            skipped,
            rejected,
            submitting = items.len(),
            "Records prepared"
        );

        if items.is_empty() {
            return Ok(SubmitReport::nothing_to_submit(skipped, rejected));
        }

        let start = Instant::now();
        let outcome = self.dispatcher.submit(cancel, &items).await;

        let mut report = SubmitReport::from_outcome(&outcome, start.elapsed());
        report.skipped_records = skipped;
        report.rejected_records = rejected;

        if report.committed_items > 0 {
            let last = &items[report.committed_items - 1];
            if let Err(e) = self.save_checkpoint(last).await {
                error!(error = %e, log_id = %last.log_id, "Failed to save checkpoint");
                report.message.push_str("; checkpoint not saved");
            }
        }

        if let Some(sample) = report.sample() {
            observability::record_submission(self.dispatcher.sink_name(), &sample);
        }

        Ok(report)
    }

    /// Drop covered records, build work items and order them by position
    fn prepare(
        &self,
        records: Vec<LogRecord>,
        checkpoint: Option<&Checkpoint>,
    ) -> (Vec<WorkItem>, usize, usize) {
        let mut skipped = 0;
        let mut rejected = 0;
        let mut items = Vec::with_capacity(records.len());

        for record in &records {
            if checkpoint.is_some_and(|cp| cp.covers(record)) {
                skipped += 1;
                continue;
            }
            match WorkItem::from_record(record, &self.fallback_recipient) {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!(log_id = %record.log_id, error = %e, "Record rejected");
                    rejected += 1;
                }
            }
        }

        items.sort_by(|a, b| {
            (&a.timestamp, &a.log_id).cmp(&(&b.timestamp, &b.log_id))
        });
        (items, skipped, rejected)
    }

    async fn save_checkpoint(&self, last: &WorkItem) -> Result<()> {
        let checkpoint = Checkpoint::after(last);
        self.store.save(&checkpoint).await?;
        observability::record_checkpoint_saved(checkpoint.updated_at.timestamp());
        info!(
            log_id = %checkpoint.last_log_id,
            timestamp = ?checkpoint.last_timestamp,
            "Checkpoint saved"
        );
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
