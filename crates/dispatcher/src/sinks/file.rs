//! FileSink - appends each chunk as one JSON line to a ledger file

use chrono::{DateTime, Utc};
use contracts::{BatchSink, CallId, CancellationToken, ContractError, LogDigest, WorkItem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Ledger file path
    pub path: PathBuf,
    /// Application id written with every entry
    pub app_id: String,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>, app_id: &str) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./ledger.jsonl"));

        Self {
            path,
            app_id: app_id.to_string(),
        }
    }
}

/// One ledger line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub call_id: CallId,
    pub app_id: String,
    pub recipients: Vec<String>,
    pub digests: Vec<LogDigest>,
    pub log_ids: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

struct LedgerFile {
    file: File,
    next_seq: u64,
}

/// Sink that records chunks in an append-only JSON lines file
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    ledger: Mutex<LedgerFile>,
}

impl FileSink {
    /// Open (or create) the ledger file.
    ///
    /// Call ids continue after the entries already present in the file.
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let existing = Self::count_entries(&config.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            config,
            ledger: Mutex::new(LedgerFile {
                file,
                next_seq: existing + 1,
            }),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
        app_id: &str,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params, app_id);
        Self::new(name, config)
    }

    /// Read every entry of a ledger file
    pub fn read_entries(path: &std::path::Path) -> std::io::Result<Vec<LedgerEntry>> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn count_entries(path: &std::path::Path) -> std::io::Result<u64> {
        match File::open(path) {
            Ok(file) => {
                let mut count = 0;
                for line in BufReader::new(file).lines() {
                    if !line?.trim().is_empty() {
                        count += 1;
                    }
                }
                Ok(count)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn append_chunk(&self, chunk: &[WorkItem]) -> std::io::Result<CallId> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| std::io::Error::other("ledger lock poisoned"))?;

        let call_id = CallId::from(format!("file-{}", ledger.next_seq));
        let entry = LedgerEntry {
            call_id: call_id.clone(),
            app_id: self.config.app_id.clone(),
            recipients: chunk.iter().map(|item| item.recipient.clone()).collect(),
            digests: chunk.iter().map(|item| item.digest).collect(),
            log_ids: chunk.iter().map(|item| item.log_id.clone()).collect(),
            recorded_at: Utc::now(),
        };

        let mut line = serde_json::to_vec(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');
        ledger.file.write_all(&line)?;
        ledger.file.flush()?;
        ledger.next_seq += 1;

        Ok(call_id)
    }

    fn persist_chunk(&self, chunk: &[WorkItem]) -> Result<CallId, ContractError> {
        self.append_chunk(chunk).map_err(|e| {
            error!(sink = %self.name, chunk_len = chunk.len(), error = %e, "Append failed");
            ContractError::sink_call(&self.name, e.to_string())
        })
    }
}

impl BatchSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_call",
        skip(self, chunk, cancel),
        fields(sink = %self.name, chunk_len = chunk.len())
    )]
    async fn call(
        &self,
        chunk: &[WorkItem],
        cancel: &CancellationToken,
    ) -> Result<CallId, ContractError> {
        if cancel.is_cancelled() {
            return Err(ContractError::cancelled(&self.name));
        }
        let call_id = self.persist_chunk(chunk)?;
        debug!(sink = %self.name, call_id = %call_id, "Chunk appended");
        Ok(call_id)
    }
}
