//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::{Checkpoint, CheckpointStore, RelayConfig};
use dispatcher::AnyCheckpointStore;
use serde::Serialize;
use tracing::info;

use super::validate::checkpoint_label;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    dispatcher: DispatcherInfo,
    sink: SinkInfo,
    checkpoint: CheckpointInfo,
    fallback_recipient: String,
}

#[derive(Serialize)]
struct DispatcherInfo {
    max_batch_size: usize,
    min_interval_secs: u64,
    batch_timeout_secs: u64,
    queue_max_size: usize,
    app_id: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct CheckpointInfo {
    location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<Checkpoint>,
}

/// Execute the `info` command
pub async fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let current = AnyCheckpointStore::from_config(&config.checkpoint)
        .load()
        .await
        .context("Failed to read checkpoint")?;

    let info = build_config_info(&config, current);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &RelayConfig, current: Option<Checkpoint>) -> ConfigInfo {
    ConfigInfo {
        dispatcher: DispatcherInfo {
            max_batch_size: config.dispatcher.max_batch_size,
            min_interval_secs: config.dispatcher.min_interval_secs,
            batch_timeout_secs: config.dispatcher.batch_timeout_secs,
            queue_max_size: config.dispatcher.queue_max_size,
            app_id: config.dispatcher.app_id.clone(),
        },
        sink: SinkInfo {
            name: config.sink.name.clone(),
            sink_type: format!("{:?}", config.sink.sink_type),
            params: config
                .sink
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        },
        checkpoint: CheckpointInfo {
            location: checkpoint_label(config),
            current,
        },
        fallback_recipient: config.records.fallback_recipient.clone(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("\n=== Configuration ===\n");

    println!("Dispatcher:");
    println!("  Max batch size: {}", info.dispatcher.max_batch_size);
    println!("  Min interval: {}s", info.dispatcher.min_interval_secs);
    println!("  Batch timeout: {}s", info.dispatcher.batch_timeout_secs);
    println!("  Queue max size: {}", info.dispatcher.queue_max_size);
    println!("  App id: {}", info.dispatcher.app_id);

    println!("\nSink: {} ({})", info.sink.name, info.sink.sink_type);
    for (key, value) in &info.sink.params {
        println!("  {}: {}", key, value);
    }

    println!("\nCheckpoint: {}", info.checkpoint.location);
    match &info.checkpoint.current {
        Some(cp) => {
            println!("  Last log id: {}", cp.last_log_id);
            if let Some(ref ts) = cp.last_timestamp {
                println!("  Last timestamp: {}", ts);
            }
            println!("  Updated at: {}", cp.updated_at.to_rfc3339());
        }
        None => println!("  (none saved)"),
    }

    println!("\nFallback recipient: {}", info.fallback_recipient);
    println!();
}
