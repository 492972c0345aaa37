//! Append-only change log (JSON Lines).

use std::path::{Path, PathBuf};

use kmindex_core::KmResult;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::record::ChangeLogEntry;

#[derive(Debug, Clone)]
pub struct ChangeLog {
    path: PathBuf,
}

impl ChangeLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a JSON line.
    pub async fn append(&self, entry: &ChangeLogEntry) -> KmResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// All entries in append order. Malformed lines are skipped.
    pub async fn entries(&self) -> KmResult<Vec<ChangeLogEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = idx + 1, error = %e, "Skipping malformed change-log line"),
            }
        }
        Ok(entries)
    }

    /// The most recent `limit` entries, newest first.
    pub async fn recent(&self, limit: usize) -> KmResult<Vec<ChangeLogEntry>> {
        let mut entries = self.entries().await?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }
}
