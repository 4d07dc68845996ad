//! BatchAccumulator - collects a stream of items into dispatcher submissions
//!
//! Items arrive one at a time on an unbounded channel and wait in a bounded
//! queue. A batch is flushed when `batch_size` items are pending or when the
//! oldest pending item has waited `batch_timeout`. A full queue drops its
//! oldest item. Intake continues while a flush is held at the rate gate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{BatchSink, CancellationToken, DispatcherSettings, WorkItem};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::chunker::BatchSize;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;

/// Accumulator limits
#[derive(Debug, Clone)]
pub struct AccumulatorConfig {
    /// Pending items that trigger an immediate flush
    pub batch_size: usize,
    /// Longest an item waits before a partial batch is flushed
    pub batch_timeout: Duration,
    /// Queue capacity; the oldest item is dropped beyond it
    pub queue_max_size: usize,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self::from(&DispatcherSettings::default())
    }
}

impl From<&DispatcherSettings> for AccumulatorConfig {
    fn from(settings: &DispatcherSettings) -> Self {
        Self {
            batch_size: settings.max_batch_size,
            batch_timeout: settings.batch_timeout(),
            queue_max_size: settings.queue_max_size,
        }
    }
}

/// Accumulator counters
#[derive(Debug, Default)]
pub struct AccumulatorStats {
    received: AtomicU64,
    dropped: AtomicU64,
    flushes: AtomicU64,
    failed_items: AtomicU64,
}

impl AccumulatorStats {
    /// Items accepted from the stream
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Items dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Batches handed to the dispatcher
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Items of flushed batches that were not committed
    pub fn failed_items(&self) -> u64 {
        self.failed_items.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> AccumulatorSnapshot {
        AccumulatorSnapshot {
            received: self.received(),
            dropped: self.dropped(),
            flushes: self.flushes(),
            failed_items: self.failed_items(),
        }
    }
}

/// Serializable accumulator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatorSnapshot {
    pub received: u64,
    pub dropped: u64,
    pub flushes: u64,
    pub failed_items: u64,
}

#[derive(Debug, Clone, Copy)]
enum FlushReason {
    Full,
    Timeout,
    Shutdown,
}

/// Handle to a running accumulator worker
pub struct BatchAccumulator {
    name: String,
    tx: mpsc::UnboundedSender<WorkItem>,
    stats: Arc<AccumulatorStats>,
    metrics: Arc<DispatchMetrics>,
    cancel: CancellationToken,
    worker_handle: JoinHandle<()>,
}

impl BatchAccumulator {
    /// Spawn the worker task that owns `dispatcher`
    ///
    /// # Errors
    /// `InvalidConfiguration` when `batch_size` or `queue_max_size` is zero
    pub fn spawn<S>(
        dispatcher: Dispatcher<S>,
        config: AccumulatorConfig,
    ) -> Result<Self, DispatchError>
    where
        S: BatchSink + Sync + 'static,
    {
        let batch_size = BatchSize::new(config.batch_size)?;
        if config.queue_max_size == 0 {
            return Err(DispatchError::invalid_configuration(
                "queue_max_size",
                "must be >= 1, got 0",
            ));
        }

        let name = dispatcher.sink_name().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(AccumulatorStats::default());
        let metrics = Arc::clone(dispatcher.metrics());
        let cancel = CancellationToken::new();

        info!(
            sink = %name,
            batch_size = batch_size.get(),
            batch_timeout_secs = config.batch_timeout.as_secs(),
            queue_max_size = config.queue_max_size,
            "BatchAccumulator started"
        );

        let worker = Worker {
            dispatcher,
            batch_size: batch_size.get(),
            pending: Pending {
                queue: VecDeque::new(),
                deadline: None,
                batch_timeout: config.batch_timeout,
                queue_max_size: config.queue_max_size,
                stats: Arc::clone(&stats),
            },
            cancel: cancel.clone(),
        };
        let worker_handle = tokio::spawn(worker.run(rx, name.clone()));

        Ok(Self {
            name,
            tx,
            stats,
            metrics,
            cancel,
            worker_handle,
        })
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accumulator counters
    pub fn stats(&self) -> &Arc<AccumulatorStats> {
        &self.stats
    }

    /// Dispatcher counters
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Hand one item to the accumulator; never blocks
    ///
    /// # Errors
    /// `WorkerClosed` after the worker stopped
    pub fn push(&self, item: WorkItem) -> Result<(), DispatchError> {
        self.tx.send(item).map_err(|_| DispatchError::WorkerClosed)
    }

    /// Abort the flush in flight and stop without flushing the queue
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            warn!(sink = %self.name, "Cancelling accumulator");
            self.cancel.cancel();
        }
    }

    /// Stop intake, flush what is pending and wait for the worker
    #[instrument(name = "accumulator_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> AccumulatorSnapshot {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Accumulator task panicked");
        }
        debug!(sink = %self.name, "BatchAccumulator shutdown complete");
        self.stats.snapshot()
    }
}

/// Items waiting for the next flush
struct Pending {
    queue: VecDeque<WorkItem>,
    /// When the oldest pending item times out
    deadline: Option<Instant>,
    batch_timeout: Duration,
    queue_max_size: usize,
    stats: Arc<AccumulatorStats>,
}

impl Pending {
    fn len(&self) -> usize {
        self.queue.len()
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn push(&mut self, item: WorkItem) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        if self.queue.len() >= self.queue_max_size {
            if let Some(oldest) = self.queue.pop_front() {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(log_id = %oldest.log_id, "Queue full, dropped oldest item");
            }
        }
        self.queue.push_back(item);
        self.arm();
    }

    /// Remove up to `count` of the oldest items
    fn take(&mut self, count: usize) -> Vec<WorkItem> {
        let batch = self.queue.drain(..count.min(self.queue.len())).collect();
        self.deadline = None;
        batch
    }

    /// Start the timeout for the oldest pending item
    fn arm(&mut self) {
        if self.deadline.is_none() && !self.queue.is_empty() {
            self.deadline = Instant::now().checked_add(self.batch_timeout);
        }
    }
}

struct Worker<S> {
    dispatcher: Dispatcher<S>,
    batch_size: usize,
    pending: Pending,
    cancel: CancellationToken,
}

impl<S: BatchSink + Sync> Worker<S> {
    #[instrument(name = "accumulator_loop", skip(self, rx), fields(sink = %name))]
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkItem>, name: String) {
        let mut open = true;

        while open {
            let deadline = self.pending.deadline;
            let timeout = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                item = rx.recv() => match item {
                    Some(item) => self.pending.push(item),
                    None => open = false,
                },
                _ = timeout => {
                    let count = self.pending.len();
                    if !self.flush(count, FlushReason::Timeout, &mut rx, &mut open).await {
                        break;
                    }
                }
            }

            while self.pending.len() >= self.batch_size {
                let count = self.batch_size;
                if !self.flush(count, FlushReason::Full, &mut rx, &mut open).await {
                    return;
                }
            }
        }

        if !self.cancel.is_cancelled() && !self.pending.is_empty() {
            let count = self.pending.len();
            self.flush(count, FlushReason::Shutdown, &mut rx, &mut open).await;
        }
        debug!(dropped = self.pending.stats.dropped(), "Accumulator stopped");
    }

    /// Submit the `count` oldest items. Returns false once cancelled.
    async fn flush(
        &mut self,
        count: usize,
        reason: FlushReason,
        rx: &mut mpsc::UnboundedReceiver<WorkItem>,
        open: &mut bool,
    ) -> bool {
        let batch = self.pending.take(count);
        if batch.is_empty() {
            return true;
        }

        let stats = Arc::clone(&self.pending.stats);
        stats.flushes.fetch_add(1, Ordering::Relaxed);
        info!(items = batch.len(), ?reason, "Flushing batch");

        let outcome = {
            let pending = &mut self.pending;
            let submit = self.dispatcher.submit(&self.cancel, &batch);
            tokio::pin!(submit);
            loop {
                tokio::select! {
                    outcome = &mut submit => break outcome,
                    item = rx.recv(), if *open => match item {
                        Some(item) => pending.push(item),
                        None => *open = false,
                    },
                }
            }
        };
        self.pending.arm();

        match outcome {
            Ok(result) => {
                debug!(call_id = ?result.last_call_id, "Batch committed");
                true
            }
            Err(e) => {
                let lost = batch.len() - e.partial.committed_items;
                stats.failed_items.fetch_add(lost as u64, Ordering::Relaxed);
                if e.is_cancelled() {
                    warn!(uncommitted = lost, "Flush cancelled");
                    false
                } else {
                    error!(error = %e, uncommitted = lost, "Failed to submit batch");
                    true
                }
            }
        }
    }
}
