//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract snapshots
//! - Config → dispatcher → sink flows without a real ledger
//! - Checkpoint continuity across runs
//! - Streaming intake through the batch accumulator

#[cfg(test)]
mod contract_tests {
    use contracts::{LogDigest, LogRecord, WorkItem, DEFAULT_FALLBACK_RECIPIENT};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::SinkType::Log;
        assert_eq!(contracts::DEFAULT_MAX_BATCH_SIZE, 100);
    }

    #[test]
    fn test_record_json_shape() {
        let record: LogRecord = serde_json::from_str(
            r#"{ "walletAddress": "not-a-wallet", "logId": "abc", "@timestamp": "2025-04-01T00:00:00Z" }"#,
        )
        .unwrap();
        let item = WorkItem::from_record(&record, DEFAULT_FALLBACK_RECIPIENT).unwrap();
        assert_eq!(item.recipient, DEFAULT_FALLBACK_RECIPIENT);
        assert_eq!(item.digest, LogDigest::from_log_id("abc").unwrap());
        assert_eq!(
            item.digest.to_hex(),
            "0x6162630000000000000000000000000000000000000000000000000000000000"
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CancellationToken, Checkpoint, CheckpointStore, LogDigest, WorkItem};
    use dispatcher::sinks::{
        decode_payload, encode_frame, read_frame, CallReply, CallRequest, NetworkFormat,
    };
    use dispatcher::{
        create_dispatcher, AccumulatorConfig, AnyCheckpointStore, BatchAccumulator, DispatchError,
        FileSink, SubmitHandle,
    };
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem {
                recipient: "0x5A3b5E0F1A25Dd1948D186776c04df5e32332Ef2".to_string(),
                digest: LogDigest::from_log_id(&format!("log-{i:04}")).unwrap(),
                log_id: format!("log-{i:04}"),
                timestamp: Some(format!("2025-04-01T00:00:{:02}Z", i % 60)),
            })
            .collect()
    }

    fn file_config(
        ledger: &Path,
        checkpoint: &Path,
        batch: usize,
        interval: u64,
    ) -> contracts::RelayConfig {
        let content = format!(
            r#"
[dispatcher]
max_batch_size = {batch}
min_interval_secs = {interval}

[sink]
name = "ledger"
sink_type = "file"
[sink.params]
path = "{}"

[checkpoint]
path = "{}"
"#,
            ledger.display(),
            checkpoint.display()
        );
        ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap()
    }

    /// Config → Dispatcher → FileSink: 250 items, batch 100, 60s interval
    ///
    /// Verifies:
    /// 1. Three ledger entries of 100, 100 and 50 items, in input order
    /// 2. Consecutive calls at least 60 virtual seconds apart
    /// 3. The result names the last call id
    #[tokio::test(start_paused = true)]
    async fn test_e2e_file_ledger_with_rate_limit() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("ledger.jsonl");
        let config = file_config(&ledger, &dir.path().join("cp.json"), 100, 60);

        let dispatcher = create_dispatcher(&config.dispatcher, &config.sink).unwrap();
        let submitted = items(250);
        let start = Instant::now();

        let result = dispatcher
            .submit(&CancellationToken::new(), &submitted)
            .await
            .unwrap();

        assert_eq!(result.committed_chunks, 3);
        assert_eq!(result.committed_items, 250);
        assert_eq!(result.last_call_id.unwrap().as_str(), "file-3");
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert!(start.elapsed() < Duration::from_secs(180));

        let entries = FileSink::read_entries(&ledger).unwrap();
        let sizes: Vec<usize> = entries.iter().map(|e| e.log_ids.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);

        let delivered: Vec<&String> = entries.iter().flat_map(|e| e.log_ids.iter()).collect();
        let expected: Vec<&String> = submitted.iter().map(|i| &i.log_id).collect();
        assert_eq!(delivered, expected);
    }

    /// Config → BatchAccumulator → FileSink: size and timeout flushes share the gate
    ///
    /// Verifies:
    /// 1. Two full batches and one timed-out partial batch, in push order
    /// 2. Flushes held at the gate still respect the 60s interval
    #[tokio::test(start_paused = true)]
    async fn test_e2e_accumulator_flushes_through_gate() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("ledger.jsonl");
        let mut config = file_config(&ledger, &dir.path().join("cp.json"), 3, 60);
        config.dispatcher.batch_timeout_secs = 30;
        ConfigLoader::validate(&config).unwrap();

        let dispatcher = create_dispatcher(&config.dispatcher, &config.sink).unwrap();
        let accumulator =
            BatchAccumulator::spawn(dispatcher, AccumulatorConfig::from(&config.dispatcher))
                .unwrap();
        let start = Instant::now();

        let pushed = items(7);
        for item in pushed.iter().cloned() {
            accumulator.push(item).unwrap();
        }

        tokio::time::sleep(Duration::from_secs(200)).await;
        let entries = FileSink::read_entries(&ledger).unwrap();
        let sizes: Vec<usize> = entries.iter().map(|e| e.log_ids.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);

        let delivered: Vec<&String> = entries.iter().flat_map(|e| e.log_ids.iter()).collect();
        let expected: Vec<&String> = pushed.iter().map(|i| &i.log_id).collect();
        assert_eq!(delivered, expected);

        let stats = accumulator.shutdown().await;
        assert_eq!(stats.flushes, 3);
        assert_eq!(stats.dropped, 0);
        assert!(start.elapsed() >= Duration::from_secs(120));
    }

    /// SubmitHandle + FileSink: cancellation while waiting for the gate
    #[tokio::test(start_paused = true)]
    async fn test_e2e_cancel_keeps_committed_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("ledger.jsonl");
        let config = file_config(&ledger, &dir.path().join("cp.json"), 10, 60);

        let dispatcher = create_dispatcher(&config.dispatcher, &config.sink).unwrap();
        let handle = Arc::new(SubmitHandle::spawn(dispatcher, 4));

        let pending = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.submit(items(30)).await })
        };

        tokio::time::sleep(Duration::from_secs(30)).await;
        handle.cancel();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err.error, DispatchError::Cancelled));
        assert_eq!(err.partial.committed_chunks, 1);
        assert_eq!(err.partial.total_chunks, 3);
        assert_eq!(FileSink::read_entries(&ledger).unwrap().len(), 1);
        assert_eq!(handle.metrics().cancellations(), 1);

        Arc::into_inner(handle).unwrap().shutdown().await;
    }

    /// Minimal ledger endpoint: answers each call from `replies` in order
    async fn spawn_ledger(
        format: NetworkFormat,
        replies: Vec<CallReply>,
    ) -> (SocketAddr, Arc<Mutex<Vec<CallRequest>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&seen);
        tokio::spawn(async move {
            for reply in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                let payload = read_frame(&mut stream, 1 << 20).await.unwrap();
                let request: CallRequest = decode_payload(format, &payload).unwrap();
                recorded.lock().unwrap().push(request);
                let frame = encode_frame(format, &reply).unwrap();
                stream.write_all(&frame).await.unwrap();
            }
        });

        (addr, seen)
    }

    /// Config → Dispatcher → NetworkSink: the second call is rejected
    ///
    /// Verifies the failing chunk index, that no third call is made and that
    /// a checkpoint after the committed prefix survives a reopen.
    #[tokio::test]
    async fn test_e2e_network_partial_failure_and_checkpoint() {
        let replies = vec![
            CallReply {
                call_id: Some("0xaaa".to_string()),
                error: None,
            },
            CallReply {
                call_id: None,
                error: Some("execution reverted".to_string()),
            },
            CallReply {
                call_id: Some("0xccc".to_string()),
                error: None,
            },
        ];
        let (addr, seen) = spawn_ledger(NetworkFormat::Bincode, replies).await;

        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("checkpoint.json");
        let content = format!(
            r#"
[dispatcher]
max_batch_size = 4
min_interval_secs = 0
app_id = "Klok"

[sink]
name = "ledger"
sink_type = "network"
[sink.params]
addr = "{addr}"
format = "bincode"
timeout_secs = "5"

[checkpoint]
path = "{}"
"#,
            checkpoint_path.display()
        );
        let config = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();
        let dispatcher = create_dispatcher(&config.dispatcher, &config.sink).unwrap();

        let submitted = items(10);
        let err = dispatcher
            .submit(&CancellationToken::new(), &submitted)
            .await
            .unwrap_err();

        assert_eq!(err.error.failed_chunk(), Some(1));
        assert_eq!(err.partial.committed_items, 4);
        assert_eq!(err.partial.last_call_id.as_ref().unwrap().as_str(), "0xaaa");

        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 2, "no call after the failed chunk");
            assert_eq!(seen[0].app_id, "Klok");
            assert_eq!(
                seen[0].log_ids,
                vec!["log-0000", "log-0001", "log-0002", "log-0003"]
            );
            assert_eq!(seen[1].log_ids[0], "log-0004");
        }

        let store = AnyCheckpointStore::from_config(&config.checkpoint);
        let last = &submitted[err.partial.committed_items - 1];
        store.save(&Checkpoint::after(last)).await.unwrap();

        let reopened = AnyCheckpointStore::from_config(&config.checkpoint);
        let loaded = reopened.load().await.unwrap().unwrap();
        assert_eq!(loaded.last_log_id, "log-0003");
    }

    #[tokio::test]
    async fn test_e2e_unreachable_endpoint_fails_first_chunk() {
        // Bind then drop to get a port with nothing listening
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let content = format!(
            r#"
[dispatcher]
min_interval_secs = 0

[sink]
name = "ledger"
sink_type = "network"
[sink.params]
addr = "{addr}"
"#
        );
        let config = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();
        let dispatcher = create_dispatcher(&config.dispatcher, &config.sink).unwrap();

        let err = dispatcher
            .submit(&CancellationToken::new(), &items(3))
            .await
            .unwrap_err();
        assert_eq!(err.error.failed_chunk(), Some(0));
        assert_eq!(err.partial.committed_chunks, 0);
        assert!(err.partial.last_call_id.is_none());
        assert_eq!(dispatcher.metrics_snapshot().sink_failures, 1);
    }
}
