//! RelayConfig - Config Loader output
//!
//! Describes the complete relay setup: dispatch limits, sink routing,
//! checkpoint location and record population rules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Default maximum items per sink call
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Default minimum seconds between the start of two sink calls
pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 60;

/// Upper bound on `min_interval_secs` (one week)
pub const MAX_MIN_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Default seconds a partial batch may wait in the accumulator
pub const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 600;

/// Default accumulator queue capacity before the oldest record is dropped
pub const DEFAULT_QUEUE_MAX_SIZE: usize = 10_000;

/// Default recipient credited when a record carries no usable wallet
pub const DEFAULT_FALLBACK_RECIPIENT: &str = "0x5A3b5E0F1A25Dd1948D186776c04df5e32332Ef2";

/// Complete relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayConfig {
    /// Dispatch limits
    #[serde(default)]
    #[validate(nested)]
    pub dispatcher: DispatcherSettings,

    /// Output routing
    #[validate(nested)]
    pub sink: SinkConfig,

    /// Checkpoint persistence
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Record population rules
    #[serde(default)]
    pub records: RecordsConfig,
}

/// Dispatch limits enforced by the downstream ledger
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatcherSettings {
    /// Maximum items per sink call, must be >= 1
    #[serde(default = "default_max_batch_size")]
    #[validate(range(min = 1))]
    pub max_batch_size: usize,

    /// Minimum seconds between the start of consecutive sink calls
    #[serde(default = "default_min_interval_secs")]
    #[validate(range(max = MAX_MIN_INTERVAL_SECS))]
    pub min_interval_secs: u64,

    /// Seconds a partial batch waits in the accumulator before it is flushed
    #[serde(default = "default_batch_timeout_secs")]
    #[validate(range(min = 1, max = MAX_MIN_INTERVAL_SECS))]
    pub batch_timeout_secs: u64,

    /// Accumulator capacity; the oldest record is dropped beyond it
    #[serde(default = "default_queue_max_size")]
    #[validate(range(min = 1))]
    pub queue_max_size: usize,

    /// Application id forwarded with every call
    #[serde(default = "default_app_id")]
    #[validate(length(min = 1))]
    pub app_id: String,
}

impl DispatcherSettings {
    /// Minimum interval as a `Duration`
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    /// Accumulator flush timeout as a `Duration`
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            min_interval_secs: default_min_interval_secs(),
            batch_timeout_secs: default_batch_timeout_secs(),
            queue_max_size: default_queue_max_size(),
            app_id: default_app_id(),
        }
    }
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_min_interval_secs() -> u64 {
    DEFAULT_MIN_INTERVAL_SECS
}

fn default_batch_timeout_secs() -> u64 {
    DEFAULT_BATCH_TIMEOUT_SECS
}

fn default_queue_max_size() -> usize {
    DEFAULT_QUEUE_MAX_SIZE
}

fn default_app_id() -> String {
    "Klok".to_string()
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink name
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Sink-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Logs chunks via tracing
    Log,
    /// Appends chunks to a JSON lines ledger file
    File,
    /// Sends chunks to a remote endpoint over TCP
    Network,
}

/// Checkpoint persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Checkpoint file; in-memory when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Record population rules applied before submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Recipient used when a record's wallet address is unusable
    #[serde(default = "default_fallback_recipient")]
    pub fallback_recipient: String,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            fallback_recipient: default_fallback_recipient(),
        }
    }
}

fn default_fallback_recipient() -> String {
    DEFAULT_FALLBACK_RECIPIENT.to_string()
}
