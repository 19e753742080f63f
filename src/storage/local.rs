//! Local filesystem watermark storage.
//!
//! Writes go to a sibling `.tmp` file that is synced and then renamed over
//! the target, so a crash mid-write leaves either the old value or the new
//! one, never a truncated timestamp.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::WatermarkStore;

/// Watermark stored as a single line of text.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    /// Create a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored watermark, distinguishing "never written" from
    /// "written but unreadable".
    pub async fn read(&self) -> Result<Option<DateTime<Utc>>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::persistence(&self.path, e)),
        };

        let trimmed = text.trim();
        DateTime::parse_from_rfc3339(trimmed)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|e| AppError::persistence(&self.path, format!("invalid timestamp {trimmed:?}: {e}")))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::persistence(&self.path, e))?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.path.with_extension("tmp");
        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        };

        write
            .await
            .map_err(|e| AppError::persistence(&self.path, e))
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn load(&self) -> DateTime<Utc> {
        match self.read().await {
            Ok(Some(ts)) => {
                log::debug!("Loaded watermark {} from {}", ts, self.path.display());
                ts
            }
            Ok(None) => {
                let now = Utc::now();
                log::info!(
                    "No watermark at {}; starting from now ({})",
                    self.path.display(),
                    now
                );
                now
            }
            Err(e) => {
                let now = Utc::now();
                log::warn!("Unreadable watermark ({e}); re-basing to now ({now})");
                now
            }
        }
    }

    async fn save(&self, ts: DateTime<Utc>) -> Result<()> {
        let line = format!("{}\n", ts.to_rfc3339_opts(SecondsFormat::Nanos, true));
        self.write_bytes(line.as_bytes()).await?;
        log::debug!("Saved watermark {} to {}", ts, self.path.display());
        Ok(())
    }
}
