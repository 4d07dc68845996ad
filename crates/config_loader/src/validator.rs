//! Configuration validation
//!
//! Rules:
//! - max_batch_size >= 1, sink name and app_id non-empty (derived)
//! - min_interval_secs at most one week, accumulator limits non-zero (derived)
//! - sink params complete for the sink type
//! - fallback recipient is a well-formed wallet address

use std::net::SocketAddr;

use contracts::{ContractError, RelayConfig, SinkConfig, SinkType};
use validator::{Validate, ValidationErrors};

/// Validate a RelayConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    config.validate().map_err(|e| first_field_error("", &e))?;
    validate_sink_params(&config.sink)?;
    validate_fallback_recipient(config)?;
    Ok(())
}

/// Flatten the first derived validation error into a dotted field path
fn first_field_error(prefix: &str, errors: &ValidationErrors) -> ContractError {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            validator::ValidationErrorsKind::Struct(inner) => {
                return first_field_error(&path, inner);
            }
            validator::ValidationErrorsKind::Field(list) => {
                let message = list
                    .first()
                    .map(|e| match &e.message {
                        Some(m) => m.to_string(),
                        None => format!("failed '{}' check", e.code),
                    })
                    .unwrap_or_else(|| "invalid value".to_string());
                return ContractError::config_validation(path, message);
            }
            validator::ValidationErrorsKind::List(items) => {
                if let Some((idx, inner)) = items.iter().next() {
                    return first_field_error(&format!("{path}[{idx}]"), inner);
                }
            }
        }
    }
    ContractError::config_validation(prefix, "invalid configuration")
}

/// Validate sink-specific parameters
fn validate_sink_params(sink: &SinkConfig) -> Result<(), ContractError> {
    match sink.sink_type {
        SinkType::Log => Ok(()),
        SinkType::File => match sink.params.get("path") {
            Some(path) if path.trim().is_empty() => Err(ContractError::config_validation(
                "sink.params.path",
                "path cannot be empty",
            )),
            _ => Ok(()),
        },
        SinkType::Network => {
            let addr = sink.params.get("addr").ok_or_else(|| {
                ContractError::config_validation("sink.params.addr", "network sink requires addr")
            })?;
            addr.parse::<SocketAddr>().map_err(|e| {
                ContractError::config_validation(
                    "sink.params.addr",
                    format!("invalid address '{addr}': {e}"),
                )
            })?;

            match sink.params.get("format").map(String::as_str) {
                None | Some("json") | Some("bincode") => Ok(()),
                Some(other) => Err(ContractError::config_validation(
                    "sink.params.format",
                    format!("unknown format '{other}', expected json or bincode"),
                )),
            }
        }
    }
}

/// Validate the fallback recipient
fn validate_fallback_recipient(config: &RelayConfig) -> Result<(), ContractError> {
    let recipient = &config.records.fallback_recipient;
    if !contracts::is_wallet_address(recipient) {
        return Err(ContractError::config_validation(
            "records.fallback_recipient",
            format!("'{recipient}' is not a 0x-prefixed 20-byte address"),
        ));
    }
    Ok(())
}
