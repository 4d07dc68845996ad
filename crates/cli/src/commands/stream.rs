//! `stream` command implementation.

use anyhow::{Context, Result};
use contracts::CancellationToken;
use dispatcher::{AccumulatorConfig, BatchAccumulator};
use tokio::io::{AsyncRead, BufReader};
use tracing::{info, warn};

use crate::cli::StreamArgs;
use crate::pipeline::{feed_lines, shutdown_signal, StreamReport};

/// Execute the `stream` command
pub async fn run_stream(args: &StreamArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(batch_timeout_secs) = args.batch_timeout_secs {
        info!(batch_timeout_secs, "Overriding batch_timeout_secs from CLI");
        config.dispatcher.batch_timeout_secs = batch_timeout_secs;
    }
    if let Some(queue_max_size) = args.queue_max_size {
        info!(queue_max_size, "Overriding queue_max_size from CLI");
        config.dispatcher.queue_max_size = queue_max_size;
    }
    config_loader::ConfigLoader::validate(&config)
        .context("Invalid configuration after CLI overrides")?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let dispatcher = dispatcher::create_dispatcher(&config.dispatcher, &config.sink)
        .context("Failed to create dispatcher")?;
    let accumulator =
        BatchAccumulator::spawn(dispatcher, AccumulatorConfig::from(&config.dispatcher))
            .context("Failed to start accumulator")?;

    let input: Box<dyn AsyncRead + Unpin + Send> = if args.input.as_os_str() == "-" {
        Box::new(tokio::io::stdin())
    } else {
        let file = tokio::fs::File::open(&args.input)
            .await
            .with_context(|| format!("Failed to open input {}", args.input.display()))?;
        Box::new(file)
    };

    // Stop intake on Ctrl+C / SIGTERM; pending items are still flushed
    let cancel = CancellationToken::new();
    let signal_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, stopping intake...");
            cancel.cancel();
        })
    };

    let fed = feed_lines(
        BufReader::new(input),
        &accumulator,
        &config.records.fallback_recipient,
        &cancel,
    )
    .await;
    signal_task.abort();

    let snapshot = accumulator.shutdown().await;
    let mut report = fed?;
    report.accumulator = snapshot;
    observability::record_records_rejected(report.rejected_records);
    observability::record_records_dropped(report.accumulator.dropped as usize);

    print_report(&report, args.json)?;

    if report.success() {
        Ok(())
    } else {
        anyhow::bail!(
            "Stream incomplete: {} dropped, {} not committed",
            report.accumulator.dropped,
            report.accumulator.failed_items
        )
    }
}

fn print_report(report: &StreamReport, json: bool) -> Result<()> {
    if json {
        let json =
            serde_json::to_string_pretty(report).context("Failed to serialize stream report")?;
        println!("{}", json);
    } else {
        report.print_summary();
    }
    Ok(())
}
