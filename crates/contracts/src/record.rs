//! Log records and the work items built from them
//!
//! `LogRecord` is what the ingress receives; `WorkItem` is what the
//! dispatcher delivers. Populating a work item (digest, recipient fallback)
//! is the caller's job and happens before submission.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ContractError;

/// Length of a log digest in bytes
pub const DIGEST_LEN: usize = 32;

/// Inference log record as received from the ingress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Wallet of the user the log belongs to (may be empty or malformed)
    #[serde(default)]
    pub wallet_address: String,

    /// Unique log identifier
    pub log_id: String,

    /// ISO 8601 timestamp assigned by the log index
    #[serde(rename = "@timestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// 32-byte content digest recorded on the ledger for one log
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogDigest([u8; DIGEST_LEN]);

impl LogDigest {
    /// Derive the digest of a log id.
    ///
    /// A `0x`-prefixed id of 64 hex digits is taken verbatim; any other id is
    /// encoded as UTF-8 and right-padded with zeros.
    ///
    /// # Errors
    /// Empty ids, malformed hex and ids longer than 32 bytes are rejected.
    pub fn from_log_id(log_id: &str) -> Result<Self, ContractError> {
        if log_id.is_empty() {
            return Err(ContractError::invalid_record(log_id, "log id is empty"));
        }

        let mut bytes = [0u8; DIGEST_LEN];

        if let Some(hex_part) = log_id.strip_prefix("0x") {
            if hex_part.len() == DIGEST_LEN * 2 {
                hex::decode_to_slice(hex_part, &mut bytes).map_err(|e| {
                    ContractError::invalid_record(log_id, format!("malformed hex digest: {e}"))
                })?;
                return Ok(Self(bytes));
            }
        }

        let raw = log_id.as_bytes();
        if raw.len() > DIGEST_LEN {
            return Err(ContractError::invalid_record(
                log_id,
                format!("log id is {} bytes, max is {DIGEST_LEN}", raw.len()),
            ));
        }
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self(bytes))
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex rendering
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for LogDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogDigest({})", self.to_hex())
    }
}

impl fmt::Display for LogDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for LogDigest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LogDigest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_log_id(&s).map_err(serde::de::Error::custom)
    }
}

/// One unit of data delivered to a sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Recipient address credited on the ledger
    pub recipient: String,

    /// Content digest written on the ledger
    pub digest: LogDigest,

    /// Originating log id
    pub log_id: String,

    /// Originating timestamp, used for checkpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl WorkItem {
    /// Build a work item from a record.
    ///
    /// Records whose wallet is not `0x`-prefixed are credited to `fallback_recipient`.
    pub fn from_record(
        record: &LogRecord,
        fallback_recipient: &str,
    ) -> Result<Self, ContractError> {
        let digest = LogDigest::from_log_id(&record.log_id)?;
        let recipient = if record.wallet_address.starts_with("0x") {
            record.wallet_address.clone()
        } else {
            fallback_recipient.to_string()
        };

        Ok(Self {
            recipient,
            digest,
            log_id: record.log_id.clone(),
            timestamp: record.timestamp.clone(),
        })
    }
}

/// Whether `addr` looks like a 20-byte hex account address
pub fn is_wallet_address(addr: &str) -> bool {
    addr.strip_prefix("0x")
        .is_some_and(|h| h.len() == 40 && h.bytes().all(|b| b.is_ascii_hexdigit()))
}
