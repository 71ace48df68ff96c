//! Append-only JSON Lines ledger of blocked and restricted sources.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::error::DedupError;
use super::traits::FailureLedger;
use super::types::FailureRecord;

/// Writes one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlFailureLedger {
    path: PathBuf,
    // Serialises appends from concurrent jobs.
    write_lock: Mutex<()>,
}

impl JsonlFailureLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record back. A missing file is an empty ledger.
    pub async fn read_all(&self) -> Result<Vec<FailureRecord>, DedupError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };

        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    fn io_error(&self, source: std::io::Error) -> DedupError {
        DedupError::Ledger {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl FailureLedger for JsonlFailureLedger {
    async fn record(&self, record: FailureRecord) -> Result<(), DedupError> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| self.io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        Ok(())
    }
}
