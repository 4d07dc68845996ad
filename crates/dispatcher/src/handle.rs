//! SubmitHandle - runs a dispatcher on its own worker task

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{BatchSink, CancellationToken, WorkItem};

use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, SubmitError};
use crate::metrics::DispatchMetrics;
use crate::submission::SubmissionResult;

type Reply = oneshot::Sender<Result<SubmissionResult, SubmitError>>;

struct SubmitRequest {
    items: Vec<WorkItem>,
    reply: Reply,
}

/// Handle to a running dispatcher worker
///
/// Submissions are queued and processed one at a time, in arrival order.
pub struct SubmitHandle {
    /// Sink name
    name: String,
    /// Channel to send submissions to the worker
    tx: mpsc::Sender<SubmitRequest>,
    /// Shared metrics
    metrics: Arc<DispatchMetrics>,
    /// Cancels the submission in flight on shutdown
    cancel: CancellationToken,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SubmitHandle {
    /// Spawn the worker task that owns `dispatcher`
    pub fn spawn<S>(dispatcher: Dispatcher<S>, queue_capacity: usize) -> Self
    where
        S: BatchSink + Sync + 'static,
    {
        let name = dispatcher.sink_name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::clone(dispatcher.metrics());
        let cancel = CancellationToken::new();

        let worker_cancel = cancel.clone();
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            submit_worker(dispatcher, rx, worker_cancel, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            cancel,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Queue `items` and wait for the outcome
    ///
    /// Waits for queue space when the worker is busy.
    pub async fn submit(&self, items: Vec<WorkItem>) -> Result<SubmissionResult, SubmitError> {
        let (reply, rx) = oneshot::channel();
        let closed = || SubmitError::new(SubmissionResult::default(), DispatchError::WorkerClosed);

        if self.tx.send(SubmitRequest { items, reply }).await.is_err() {
            error!(sink = %self.name, "Dispatcher worker closed unexpectedly");
            return Err(closed());
        }

        rx.await.unwrap_or_else(|_| Err(closed()))
    }

    /// Cancel the submission in flight; queued submissions are refused
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            warn!(sink = %self.name, "Cancelling dispatcher worker");
            self.cancel.cancel();
        }
    }

    /// Cancel outstanding work and wait for the worker to stop
    #[instrument(name = "submit_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        self.cancel();
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SubmitHandle shutdown complete");
    }
}

#[instrument(name = "submit_worker_loop", skip(dispatcher, rx, cancel), fields(sink = %name))]
async fn submit_worker<S: BatchSink + Sync>(
    dispatcher: Dispatcher<S>,
    mut rx: mpsc::Receiver<SubmitRequest>,
    cancel: CancellationToken,
    name: String,
) {
    debug!(sink = %name, "Dispatcher worker started");

    while let Some(request) = rx.recv().await {
        let outcome = if cancel.is_cancelled() {
            Err(SubmitError::new(
                SubmissionResult::default(),
                DispatchError::Cancelled,
            ))
        } else {
            dispatcher.submit(&cancel, &request.items).await
        };

        if request.reply.send(outcome).is_err() {
            warn!(sink = %name, "Submitter went away before the result was ready");
        }
    }

    debug!(sink = %name, "Dispatcher worker stopped");
}
