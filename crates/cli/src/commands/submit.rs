//! `submit` command implementation.

use anyhow::{Context, Result};
use contracts::CancellationToken;
use dispatcher::AnyCheckpointStore;
use tracing::{info, warn};

use crate::cli::SubmitArgs;
use crate::pipeline::{read_records, shutdown_signal, SubmitPipeline, SubmitReport};

/// Execute the `submit` command
pub async fn run_submit(args: &SubmitArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(max_batch_size) = args.max_batch_size {
        info!(max_batch_size, "Overriding max_batch_size from CLI");
        config.dispatcher.max_batch_size = max_batch_size;
    }
    if let Some(min_interval_secs) = args.min_interval_secs {
        info!(min_interval_secs, "Overriding min_interval_secs from CLI");
        config.dispatcher.min_interval_secs = min_interval_secs;
    }
    config_loader::ConfigLoader::validate(&config)
        .context("Invalid configuration after CLI overrides")?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let records = read_records(&args.input)?;

    let dispatcher = dispatcher::create_dispatcher(&config.dispatcher, &config.sink)
        .context("Failed to create dispatcher")?;
    let store = AnyCheckpointStore::from_config(&config.checkpoint);
    let mut pipeline = SubmitPipeline::new(dispatcher, store, &config.records.fallback_recipient);
    if args.no_checkpoint {
        pipeline = pipeline.ignore_checkpoint();
    }

    info!(
        records = records.len(),
        sink = %config.sink.name,
        max_batch_size = config.dispatcher.max_batch_size,
        min_interval_secs = config.dispatcher.min_interval_secs,
        "Starting submission"
    );

    // Cancel the submission on Ctrl+C / SIGTERM; committed chunks are kept
    let cancel = CancellationToken::new();
    let signal_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, cancelling submission...");
            cancel.cancel();
        })
    };

    let result = pipeline.run(records, &cancel).await;
    signal_task.abort();
    let report = result?;

    print_report(&report, args.json)?;

    if report.success {
        Ok(())
    } else {
        anyhow::bail!("Submission incomplete: {}", report.message)
    }
}

fn print_report(report: &SubmitReport, json: bool) -> Result<()> {
    if json {
        let json =
            serde_json::to_string_pretty(report).context("Failed to serialize submission report")?;
        println!("{}", json);
    } else {
        report.print_summary();
    }
    Ok(())
}
