//! Durable snapshots of the meeting store

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::Meeting;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Where store snapshots are loaded from and written to.
///
/// `persist` is called with the complete post-mutation snapshot while the
/// store's write lock is held; an error aborts the mutation.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn load(&self) -> Result<Vec<Meeting>, EngineError>;

    async fn persist(&self, meetings: &[Meeting]) -> Result<(), EngineError>;
}

/// On-disk layout: `{"meetings": [...]}`
#[derive(Debug, Deserialize)]
struct MeetingsFile {
    #[serde(default)]
    meetings: Vec<Meeting>,
}

/// JSON file sink. Writes go to a sibling temp file that is then renamed
/// over the target, so readers never see a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
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
            .unwrap_or_else(|| "meetings.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotSink for JsonFileSink {
    async fn load(&self) -> Result<Vec<Meeting>, EngineError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No meetings file at {:?}, starting empty", self.path);
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(EngineError::Persistence(format!(
                    "Failed to read {:?}: {}",
                    self.path, e
                )))
            }
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let file: MeetingsFile = serde_json::from_str(&contents).map_err(|e| {
            EngineError::Persistence(format!("Failed to parse {:?}: {}", self.path, e))
        })?;
        Ok(file.meetings)
    }

    async fn persist(&self, meetings: &[Meeting]) -> Result<(), EngineError> {
        let body = serde_json::to_string_pretty(&serde_json::json!({ "meetings": meetings }))
            .map_err(|e| EngineError::Persistence(format!("Failed to serialize meetings: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    EngineError::Persistence(format!("Failed to create {:?}: {}", parent, e))
                })?;
            }
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| EngineError::Persistence(format!("Failed to write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            EngineError::Persistence(format!("Failed to replace {:?}: {}", self.path, e))
        })?;

        tracing::debug!("Persisted {} meetings to {:?}", meetings.len(), self.path);
        Ok(())
    }
}
