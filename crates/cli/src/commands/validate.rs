//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{RelayConfig, SinkType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    sink_name: String,
    sink_type: String,
    max_batch_size: usize,
    min_interval_secs: u64,
    app_id: String,
    checkpoint: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    sink_name: config.sink.name.clone(),
                    sink_type: format!("{:?}", config.sink.sink_type),
                    max_batch_size: config.dispatcher.max_batch_size,
                    min_interval_secs: config.dispatcher.min_interval_secs,
                    app_id: config.dispatcher.app_id.clone(),
                    checkpoint: checkpoint_label(&config),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Checkpoint location for display
pub(crate) fn checkpoint_label(config: &RelayConfig) -> String {
    match &config.checkpoint.path {
        Some(path) => path.display().to_string(),
        None => "in-memory".to_string(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RelayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.dispatcher.min_interval_secs == 0 {
        warnings.push(
            "dispatcher.min_interval_secs is 0 - sink calls are not rate limited".to_string(),
        );
    }

    if config.checkpoint.path.is_none() {
        warnings.push("checkpoint.path not set - progress is not kept between runs".to_string());
    }

    if config.sink.sink_type == SinkType::File && !config.sink.params.contains_key("path") {
        warnings.push("sink.params.path not set - using ./ledger.jsonl".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Sink: {} ({})", summary.sink_name, summary.sink_type);
            println!("  Max batch size: {}", summary.max_batch_size);
            println!("  Min interval: {}s", summary.min_interval_secs);
            println!("  App id: {}", summary.app_id);
            println!("  Checkpoint: {}", summary.checkpoint);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
