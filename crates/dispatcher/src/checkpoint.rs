//! Checkpoint stores
//!
//! In-memory store for tests and ad-hoc runs, JSON file store for real ones.

use std::path::{Path, PathBuf};

use contracts::{Checkpoint, CheckpointConfig, CheckpointStore, ContractError};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Checkpoint store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    current: Mutex<Option<Checkpoint>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, ContractError> {
        Ok(self.current.lock().await.clone())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), ContractError> {
        *self.current.lock().await = Some(checkpoint.clone());
        Ok(())
    }
}

/// Checkpoint store backed by a JSON file
///
/// Saves go through a sibling temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store at `path`; the file is created on first save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CheckpointStore for FileCheckpointStore {
    #[instrument(name = "file_checkpoint_load", skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<Checkpoint>, ContractError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint found, starting from beginning");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let checkpoint = serde_json::from_str(&content)
            .map_err(|e| ContractError::checkpoint(format!("corrupt checkpoint file: {e}")))?;
        Ok(Some(checkpoint))
    }

    #[instrument(
        name = "file_checkpoint_save",
        skip(self, checkpoint),
        fields(path = %self.path.display())
    )]
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), ContractError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| ContractError::checkpoint(format!("serialize error: {e}")))?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(last_log_id = %checkpoint.last_log_id, "Checkpoint saved");
        Ok(())
    }
}

/// Any configured checkpoint store
#[derive(Debug)]
pub enum AnyCheckpointStore {
    Memory(MemoryCheckpointStore),
    File(FileCheckpointStore),
}

impl AnyCheckpointStore {
    /// Open the store described by `config`
    pub fn from_config(config: &CheckpointConfig) -> Self {
        match &config.path {
            Some(path) => Self::File(FileCheckpointStore::new(path)),
            None => Self::Memory(MemoryCheckpointStore::new()),
        }
    }
}

impl CheckpointStore for AnyCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, ContractError> {
        match self {
            Self::Memory(store) => store.load().await,
            Self::File(store) => store.load().await,
        }
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), ContractError> {
        match self {
            Self::Memory(store) => store.save(checkpoint).await,
            Self::File(store) => store.save(checkpoint).await,
        }
    }
}
