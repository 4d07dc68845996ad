//! Checkpoint - last position committed downstream
//!
//! The store is a narrow load/save collaborator; the dispatcher never touches it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContractError, LogRecord, WorkItem};

/// Last committed position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Timestamp of the last committed record (ISO 8601)
    pub last_timestamp: Option<String>,

    /// Log id of the last committed record
    pub last_log_id: String,

    /// When the checkpoint was written
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Checkpoint positioned right after `item`
    pub fn after(item: &WorkItem) -> Self {
        Self {
            last_timestamp: item.timestamp.clone(),
            last_log_id: item.log_id.clone(),
            updated_at: Utc::now(),
        }
    }

    /// Whether `record` was already committed according to this checkpoint.
    ///
    /// Positions are ordered by `(timestamp, log_id)`, timestamps compared as
    /// ISO 8601 strings, so a chunk boundary inside a group of records sharing
    /// one timestamp is resumed exactly. Records without a timestamp are
    /// never considered covered.
    pub fn covers(&self, record: &LogRecord) -> bool {
        match (&self.last_timestamp, &record.timestamp) {
            (Some(last), Some(ts)) => {
                (ts.as_str(), record.log_id.as_str())
                    <= (last.as_str(), self.last_log_id.as_str())
            }
            _ => false,
        }
    }
}

/// Checkpoint persistence trait
#[trait_variant::make(CheckpointStore: Send)]
pub trait LocalCheckpointStore {
    /// Load the last saved checkpoint, `None` when nothing was saved yet
    async fn load(&self) -> Result<Option<Checkpoint>, ContractError>;

    /// Persist a checkpoint, replacing the previous one
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), ContractError>;
}
