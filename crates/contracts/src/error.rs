//! Layered error definitions
//!
//! Categorized by source: config / record / sink / checkpoint

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Record Errors =====
    /// A log record cannot be turned into a work item
    #[error("invalid record '{log_id}': {message}")]
    InvalidRecord { log_id: String, message: String },

    // ===== Sink Errors =====
    /// Remote call rejected or failed
    #[error("sink '{sink_name}' call error: {message}")]
    SinkCall { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    /// The caller cancelled while the sink call was in progress
    #[error("sink '{sink_name}' call cancelled")]
    Cancelled { sink_name: String },

    // ===== Checkpoint Errors =====
    /// Checkpoint load/save error
    #[error("checkpoint error: {message}")]
    Checkpoint { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid record error
    pub fn invalid_record(log_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            log_id: log_id.into(),
            message: message.into(),
        }
    }

    /// Create sink call error
    pub fn sink_call(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCall {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create cancellation error for a sink
    pub fn cancelled(sink_name: impl Into<String>) -> Self {
        Self::Cancelled {
            sink_name: sink_name.into(),
        }
    }

    /// Create checkpoint error
    pub fn checkpoint(message: impl Into<String>) -> Self {
        Self::Checkpoint {
            message: message.into(),
        }
    }

    /// Whether the error stems from caller cancellation rather than the remote side
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
