//! Dispatcher - ordered, rate-limited delivery of one submission to a sink

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    BatchSink, CallId, CancellationToken, DispatcherSettings, SinkConfig, SinkType, WorkItem,
};
use tracing::{debug, error, info, instrument, warn};

use crate::chunker::{self, BatchSize};
use crate::error::{DispatchError, SubmitError};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::rate_gate::RateGate;
use crate::sinks::{AnySink, FileSink, LogSink, NetworkSink};
use crate::submission::SubmissionResult;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum items per sink call
    pub max_batch_size: usize,
    /// Minimum time between the start of consecutive sink calls
    pub min_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: contracts::DEFAULT_MAX_BATCH_SIZE,
            min_interval: Duration::from_secs(contracts::DEFAULT_MIN_INTERVAL_SECS),
        }
    }
}

impl From<&DispatcherSettings> for DispatcherConfig {
    fn from(settings: &DispatcherSettings) -> Self {
        Self {
            max_batch_size: settings.max_batch_size,
            min_interval: settings.min_interval(),
        }
    }
}

/// Create a sink from configuration
#[instrument(
    name = "dispatcher_create_sink",
    skip(config, app_id),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn create_sink(config: &SinkConfig, app_id: &str) -> Result<AnySink, DispatchError> {
    match config.sink_type {
        SinkType::Log => Ok(AnySink::Log(LogSink::new(&config.name))),
        SinkType::File => FileSink::from_params(&config.name, &config.params, app_id)
            .map(AnySink::File)
            .map_err(|e| DispatchError::sink_creation(&config.name, e.to_string())),
        SinkType::Network => NetworkSink::from_params(&config.name, &config.params, app_id)
            .map(AnySink::Network)
            .map_err(|e| DispatchError::sink_creation(&config.name, e.to_string())),
    }
}

/// Delivers submissions to one sink, in order, through one rate gate
pub struct Dispatcher<S> {
    sink: S,
    gate: RateGate,
    batch_size: BatchSize,
    metrics: Arc<DispatchMetrics>,
}

impl<S: BatchSink + Sync> Dispatcher<S> {
    /// Create a dispatcher owning `sink` and a fresh rate gate
    ///
    /// # Errors
    /// `InvalidConfiguration` when `max_batch_size` is zero
    pub fn new(config: DispatcherConfig, sink: S) -> Result<Self, DispatchError> {
        let batch_size = BatchSize::new(config.max_batch_size)?;
        info!(
            sink = %sink.name(),
            max_batch_size = batch_size.get(),
            min_interval_secs = config.min_interval.as_secs_f64(),
            "Dispatcher created"
        );

        Ok(Self {
            sink,
            gate: RateGate::new(config.min_interval),
            batch_size,
            metrics: Arc::new(DispatchMetrics::new()),
        })
    }

    /// Sink name
    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Configured batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Configured minimum interval
    pub fn min_interval(&self) -> Duration {
        self.gate.min_interval()
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Current metrics
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Deliver `items` to the sink.
    ///
    /// Items are split into chunks of at most `max_batch_size`; chunk N's
    /// call starts only after chunk N-1's call returned. Stops at the first
    /// failure; chunks already committed stay committed.
    ///
    /// # Errors
    /// `SubmitError` carrying the partial result and either `Cancelled` or
    /// `SinkFailure` tagged with the failing chunk index.
    #[instrument(
        name = "dispatcher_submit",
        skip(self, cancel, items),
        fields(sink = %self.sink.name(), items = items.len())
    )]
    pub async fn submit(
        &self,
        cancel: &CancellationToken,
        items: &[WorkItem],
    ) -> Result<SubmissionResult, SubmitError> {
        if items.is_empty() {
            debug!("Empty submission, nothing to dispatch");
            return Ok(SubmissionResult::default());
        }

        let total_chunks = chunker::chunk_count(items.len(), self.batch_size);
        let mut result = SubmissionResult::planned(total_chunks);
        self.metrics.inc_submissions();

        info!(chunks = total_chunks, "Submission started");

        for (chunk_index, chunk) in chunker::chunk(items, self.batch_size).enumerate() {
            if let Err(error) = self.gate.wait(cancel).await {
                return Err(self.stop(result, error));
            }

            match self.call_sink(chunk_index, total_chunks, chunk, cancel).await {
                Ok(call_id) => {
                    self.metrics.record_commit(chunk.len());
                    result.record_commit(call_id, chunk.len());
                }
                Err(source) if source.is_cancelled() => {
                    return Err(self.stop(result, DispatchError::Cancelled));
                }
                Err(source) => {
                    return Err(self.stop(
                        result,
                        DispatchError::SinkFailure {
                            chunk_index,
                            source,
                        },
                    ));
                }
            }
        }

        info!(
            chunks = result.committed_chunks,
            items = result.committed_items,
            last_call_id = ?result.last_call_id,
            "Submission completed"
        );
        Ok(result)
    }

    async fn call_sink(
        &self,
        chunk_index: usize,
        total_chunks: usize,
        chunk: &[WorkItem],
        cancel: &CancellationToken,
    ) -> Result<CallId, contracts::ContractError> {
        debug!(
            chunk = chunk_index + 1,
            of = total_chunks,
            chunk_len = chunk.len(),
            "Calling sink"
        );
        let call_id = self.sink.call(chunk, cancel).await?;
        info!(
            chunk = chunk_index + 1,
            of = total_chunks,
            chunk_len = chunk.len(),
            call_id = %call_id,
            "Chunk committed"
        );
        Ok(call_id)
    }

    fn stop(&self, partial: SubmissionResult, error: DispatchError) -> SubmitError {
        match &error {
            DispatchError::Cancelled => {
                self.metrics.inc_cancellations();
                warn!(
                    committed_chunks = partial.committed_chunks,
                    total_chunks = partial.total_chunks,
                    "Submission cancelled"
                );
            }
            _ => {
                self.metrics.inc_sink_failures();
                error!(
                    committed_chunks = partial.committed_chunks,
                    total_chunks = partial.total_chunks,
                    error = %error,
                    "Submission failed"
                );
            }
        }
        SubmitError::new(partial, error)
    }
}

/// Convenience function to create a dispatcher from loaded settings
#[instrument(name = "dispatcher_create", skip(settings, sink_config))]
pub fn create_dispatcher(
    settings: &DispatcherSettings,
    sink_config: &SinkConfig,
) -> Result<Dispatcher<AnySink>, DispatchError> {
    let sink = create_sink(sink_config, &settings.app_id)?;
    Dispatcher::new(DispatcherConfig::from(settings), sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, LogDigest};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Sink that records every chunk it receives
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(Instant, Vec<String>)>>,
        fail_on_call: Option<usize>,
        delay: Duration,
    }

    impl RecordingSink {
        fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(Instant, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl BatchSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn call(
            &self,
            chunk: &[WorkItem],
            cancel: &CancellationToken,
        ) -> Result<CallId, ContractError> {
            let started = Instant::now();
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((started, chunk.iter().map(|i| i.log_id.clone()).collect()));
                calls.len() - 1
            };
            if !self.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ContractError::cancelled("recording")),
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
            if self.fail_on_call == Some(index) {
                return Err(ContractError::sink_call("recording", "remote rejected"));
            }
            Ok(CallId::from(format!("tx-{index}")))
        }
    }

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem {
                recipient: "0xabc".to_string(),
                digest: LogDigest::from_log_id(&format!("log-{i}")).unwrap(),
                log_id: format!("log-{i}"),
                timestamp: None,
            })
            .collect()
    }

    fn dispatcher(sink: RecordingSink, max: usize, secs: u64) -> Dispatcher<RecordingSink> {
        Dispatcher::new(
            DispatcherConfig {
                max_batch_size: max,
                min_interval: Duration::from_secs(secs),
            },
            sink,
        )
        .unwrap()
    }

    #[test]
    fn test_zero_batch_size_is_invalid() {
        let result = Dispatcher::new(
            DispatcherConfig {
                max_batch_size: 0,
                min_interval: Duration::from_secs(1),
            },
            RecordingSink::default(),
        );
        assert!(matches!(
            result,
            Err(DispatchError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_submission_makes_no_call() {
        let d = dispatcher(RecordingSink::default(), 10, 60);
        let start = Instant::now();

        let result = d.submit(&CancellationToken::new(), &[]).await.unwrap();

        assert_eq!(result, SubmissionResult::default());
        assert!(d.sink.calls().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(d.metrics_snapshot().submissions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_delivered_in_order_with_interval() {
        let d = dispatcher(RecordingSink::default(), 100, 60);
        let submitted = items(250);

        let result = d.submit(&CancellationToken::new(), &submitted).await.unwrap();

        assert_eq!(result.total_chunks, 3);
        assert_eq!(result.committed_chunks, 3);
        assert_eq!(result.committed_items, 250);
        assert_eq!(result.last_call_id, Some(CallId::from("tx-2")));

        let calls = d.sink.calls();
        let sizes: Vec<usize> = calls.iter().map(|(_, ids)| ids.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);

        let delivered: Vec<String> = calls.iter().flat_map(|(_, ids)| ids.clone()).collect();
        let expected: Vec<String> = submitted.iter().map(|i| i.log_id.clone()).collect();
        assert_eq!(delivered, expected);

        for pair in calls.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= Duration::from_secs(60));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_stops_remaining_chunks() {
        let d = dispatcher(RecordingSink::failing_on(1), 4, 1);

        let err = d.submit(&CancellationToken::new(), &items(10)).await.unwrap_err();

        assert_eq!(err.error.failed_chunk(), Some(1));
        assert_eq!(err.partial.committed_chunks, 1);
        assert_eq!(err.partial.committed_items, 4);
        assert_eq!(err.partial.total_chunks, 3);
        assert_eq!(err.partial.last_call_id, Some(CallId::from("tx-0")));
        assert_eq!(d.sink.calls().len(), 2, "no third call after failure");

        let snapshot = d.metrics_snapshot();
        assert_eq!(snapshot.sink_failures, 1);
        assert_eq!(snapshot.chunks_committed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_on_first_chunk_has_no_call_id() {
        let d = dispatcher(RecordingSink::failing_on(0), 4, 1);

        let err = d.submit(&CancellationToken::new(), &items(3)).await.unwrap_err();

        assert_eq!(err.error.failed_chunk(), Some(0));
        assert_eq!(err.partial.committed_chunks, 0);
        assert!(err.partial.last_call_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_gate_wait() {
        let d = Arc::new(dispatcher(RecordingSink::default(), 2, 60));
        let cancel = CancellationToken::new();

        let task = {
            let d = Arc::clone(&d);
            let cancel = cancel.clone();
            tokio::spawn(async move { d.submit(&cancel, &items(6)).await })
        };

        // First chunk goes out immediately, the second waits on the gate
        tokio::time::sleep(Duration::from_secs(5)).await;
        let cancelled_at = Instant::now();
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(cancelled_at.elapsed() < Duration::from_secs(1));
        assert_eq!(err.partial.committed_chunks, 1);
        assert_eq!(d.sink.calls().len(), 1);
        assert_eq!(d.metrics_snapshot().cancellations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_inside_sink_call() {
        let sink = RecordingSink {
            delay: Duration::from_secs(30),
            ..RecordingSink::default()
        };
        let d = Arc::new(dispatcher(sink, 5, 1));
        let cancel = CancellationToken::new();

        let task = {
            let d = Arc::clone(&d);
            let cancel = cancel.clone();
            tokio::spawn(async move { d.submit(&cancel, &items(10)).await })
        };

        tokio::time::sleep(Duration::from_secs(10)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err.error, DispatchError::Cancelled));
        assert_eq!(err.partial.committed_chunks, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_is_shared_across_submissions() {
        let d = dispatcher(RecordingSink::default(), 10, 60);
        let cancel = CancellationToken::new();

        d.submit(&cancel, &items(3)).await.unwrap();
        d.submit(&cancel, &items(3)).await.unwrap();

        let calls = d.sink.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].0 - calls[0].0 >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_submissions_respect_interval() {
        let d = Arc::new(dispatcher(RecordingSink::default(), 2, 20));
        let cancel = CancellationToken::new();

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let d = Arc::clone(&d);
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move { d.submit(&cancel, &items(4)).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut starts: Vec<Instant> = d.sink.calls().iter().map(|(t, _)| *t).collect();
        assert_eq!(starts.len(), 6);
        starts.sort();
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(20));
        }
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_settings() {
        let settings = DispatcherSettings {
            max_batch_size: 25,
            min_interval_secs: 0,
            app_id: "Klok".to_string(),
            ..Default::default()
        };
        let sink_config = SinkConfig {
            name: "test_log".to_string(),
            sink_type: SinkType::Log,
            params: Default::default(),
        };

        let d = create_dispatcher(&settings, &sink_config).unwrap();
        assert_eq!(d.batch_size(), 25);
        assert_eq!(d.sink_name(), "test_log");

        let result = d.submit(&CancellationToken::new(), &items(60)).await.unwrap();
        assert_eq!(result.committed_chunks, 3);
        assert_eq!(result.last_call_id, Some(CallId::from("log-3")));
    }

    #[test]
    fn test_create_network_sink_requires_addr() {
        let sink_config = SinkConfig {
            name: "remote".to_string(),
            sink_type: SinkType::Network,
            params: Default::default(),
        };
        assert!(matches!(
            create_sink(&sink_config, "Klok"),
            Err(DispatchError::SinkCreation { .. })
        ));
    }
}
