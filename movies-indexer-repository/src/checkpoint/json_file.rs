//! JSON-file implementation of the checkpoint store.
//!
//! The watermark is kept in a small JSON document (`{"modified": "..."}`) so it
//! survives process restarts.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use movies_indexer_shared::Watermark;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::errors::CheckpointError;
use crate::interfaces::CheckpointStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointState {
    #[serde(default)]
    modified: Option<Watermark>,
}

/// Checkpoint store backed by a JSON file.
///
/// Saves go through a sibling temporary file that is flushed to disk and then
/// renamed over the target, so readers only ever see a complete file.
pub struct JsonFileCheckpointStore {
    path: PathBuf,
}

impl JsonFileCheckpointStore {
    /// Create a store for the given file. The file does not need to exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpointStore {
    async fn load(&self) -> Option<Watermark> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No checkpoint file, starting from scratch");
                return None;
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Checkpoint file is unreadable, treating as absent"
                );
                return None;
            }
        };

        if contents.trim().is_empty() {
            return None;
        }

        match serde_json::from_str::<CheckpointState>(&contents) {
            Ok(state) => state.modified,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Checkpoint file is corrupt, treating as absent"
                );
                None
            }
        }
    }

    async fn save(&self, watermark: Watermark) -> Result<(), CheckpointError> {
        let state = CheckpointState {
            modified: Some(watermark),
        };
        let payload = serde_json::to_vec_pretty(&state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&payload).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), watermark = %watermark, "Checkpoint saved");
        Ok(())
    }
}
