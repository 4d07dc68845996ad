//! Input records: a bare JSON array or a `{"logs": [...]}` body.

use anyhow::{Context, Result};
use contracts::LogRecord;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum InputBody {
    Records(Vec<LogRecord>),
    Wrapped { logs: Vec<LogRecord> },
}

/// Parse records from a JSON document
pub fn parse_records(content: &str) -> Result<Vec<LogRecord>> {
    let body: InputBody = serde_json::from_str(content)
        .context("Input must be a JSON array of log records or an object with a \"logs\" array")?;

    Ok(match body {
        InputBody::Records(records) => records,
        InputBody::Wrapped { logs } => logs,
    })
}

/// Read records from a file, or stdin when `path` is "-"
pub fn read_records(path: &Path) -> Result<Vec<LogRecord>> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read records from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()))?
    };
    parse_records(&content)
}
