//! File-backed version records.
//!
//! One file per `(module_id, version)`: `<module_id>_v<version>.json`, both
//! parts encoded with `storage_key` so distinct pairs never share a file.
//! When a version is updated in place, the old file is first copied to
//! `<module_id>_v<version>_prev.json` for audit; `_prev` files are never
//! read back as history.

use std::path::{Path, PathBuf};

use kmindex_core::module::storage_key;
use kmindex_core::{KmError, KmResult};
use tracing::{debug, warn};

use crate::record::VersionRecord;

const PREV_SUFFIX: &str = "_prev.json";

#[derive(Debug, Clone)]
pub struct VersionStore {
    dir: PathBuf,
}

impl VersionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_prefix(module_id: &str) -> String {
        format!("{}_v", storage_key(module_id))
    }

    /// Path of the record for `(module_id, version)`.
    pub fn record_path(&self, module_id: &str, version: &str) -> PathBuf {
        self.dir.join(format!(
            "{}{}.json",
            Self::file_prefix(module_id),
            storage_key(version)
        ))
    }

    /// Path of the `_prev` side copy for `(module_id, version)`.
    pub fn prev_path(&self, module_id: &str, version: &str) -> PathBuf {
        self.dir.join(format!(
            "{}{}{}",
            Self::file_prefix(module_id),
            storage_key(version),
            PREV_SUFFIX
        ))
    }

    /// Read the record for `(module_id, version)`.
    ///
    /// `Ok(None)` when no record exists; an error when the file exists but
    /// cannot be read or parsed, or holds the record of another module or version.
    pub async fn get(&self, module_id: &str, version: &str) -> KmResult<Option<VersionRecord>> {
        let path = self.record_path(module_id, version);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: VersionRecord = serde_json::from_slice(&bytes)?;
        if record.module_id != module_id || record.version != version {
            return Err(KmError::RecordConflict {
                path: path.display().to_string(),
                expected: format!("{} v{}", module_id, version),
                found: format!("{} v{}", record.module_id, record.version),
            });
        }
        Ok(Some(record))
    }

    /// Write (or overwrite) a record.
    pub async fn save(&self, record: &VersionRecord) -> KmResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.record_path(&record.module_id, &record.version);
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, json).await?;
        debug!(module_id = %record.module_id, version = %record.version, "Saved version record");
        Ok(())
    }

    /// Copy the current record of `(module_id, version)` to its `_prev` file.
    ///
    /// Best-effort: failures are logged and reported as `false`.
    pub async fn archive_previous(&self, module_id: &str, version: &str) -> bool {
        let from = self.record_path(module_id, version);
        let to = self.prev_path(module_id, version);
        match tokio::fs::copy(&from, &to).await {
            Ok(_) => true,
            Err(e) => {
                warn!(module_id = %module_id, version = %version, error = %e, "Failed to archive previous version");
                false
            }
        }
    }

    /// All stored versions of a module, newest first.
    ///
    /// A missing directory yields an empty history; malformed files are
    /// skipped with a warning.
    pub async fn history(&self, module_id: &str) -> KmResult<Vec<VersionRecord>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let prefix = Self::file_prefix(module_id);
        let mut records = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(&prefix) || !name.ends_with(".json") || name.ends_with(PREV_SUFFIX) {
                continue;
            }

            let path = entry.path();
            let record: VersionRecord = match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping malformed version file");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable version file");
                    continue;
                }
            };

            if record.module_id == module_id {
                records.push(record);
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ModuleContent;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn content(title: &str) -> ModuleContent {
        ModuleContent {
            title: title.to_string(),
            body_text: String::new(),
            workflow_steps: Vec::new(),
            required_documents: Vec::new(),
        }
    }

    fn record_at(module_id: &str, version: &str, minutes_ago: i64) -> VersionRecord {
        let mut record = VersionRecord::new(module_id, version, content(version));
        record.created_at = Utc::now() - Duration::minutes(minutes_ago);
        record
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = VersionStore::new(tmp.path().join("versions"));
        assert!(store.get("m1", "1.0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let tmp = TempDir::new().unwrap();
        let store = VersionStore::new(tmp.path());
        let record = record_at("m1", "1.0", 0);
        store.save(&record).await.unwrap();

        assert_eq!(store.get("m1", "1.0").await.unwrap().unwrap(), record);
        assert!(store.record_path("m1", "1.0").ends_with("m1_v1.0.json"));
    }

    #[tokio::test]
    async fn test_archive_previous() {
        let tmp = TempDir::new().unwrap();
        let store = VersionStore::new(tmp.path());

        assert!(!store.archive_previous("m1", "1.0").await);

        store.save(&record_at("m1", "1.0", 0)).await.unwrap();
        assert!(store.archive_previous("m1", "1.0").await);
        assert!(store.prev_path("m1", "1.0").exists());
    }

    #[tokio::test]
    async fn test_history_newest_first_without_prev_or_neighbours() {
        let tmp = TempDir::new().unwrap();
        let store = VersionStore::new(tmp.path());

        store.save(&record_at("m1", "1.0", 30)).await.unwrap();
        store.save(&record_at("m1", "2.0", 10)).await.unwrap();
        store.save(&record_at("m1", "1.5", 20)).await.unwrap();
        store.archive_previous("m1", "2.0").await;
        store.save(&record_at("m10", "1.0", 0)).await.unwrap();
        store.save(&record_at("m1_v9", "1.0", 0)).await.unwrap();
        std::fs::write(tmp.path().join("m1_v3.0.json"), b"garbage").unwrap();

        let history = store.history("m1").await.unwrap();
        let versions: Vec<&str> = history.iter().map(|r| r.version.as_str()).collect();
        assert_eq!(versions, vec!["2.0", "1.5", "1.0"]);
    }

    #[tokio::test]
    async fn test_distinct_pairs_use_distinct_files() {
        let tmp = TempDir::new().unwrap();
        let store = VersionStore::new(tmp.path());

        assert_ne!(
            store.record_path("trade licence", "1.0"),
            store.record_path("trade_licence", "1.0")
        );
        assert_ne!(store.record_path("m1", "x_v2"), store.record_path("m1_vx", "2"));

        store.save(&record_at("m1", "x_v2", 0)).await.unwrap();
        store.save(&record_at("m1_vx", "2", 0)).await.unwrap();
        assert_eq!(store.get("m1", "x_v2").await.unwrap().unwrap().module_id, "m1");
        assert_eq!(store.get("m1_vx", "2").await.unwrap().unwrap().module_id, "m1_vx");
        assert_eq!(store.history("m1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_rejects_record_of_another_module() {
        let tmp = TempDir::new().unwrap();
        let store = VersionStore::new(tmp.path());
        store.save(&record_at("m1", "1.0", 0)).await.unwrap();
        std::fs::copy(store.record_path("m1", "1.0"), store.record_path("m2", "1.0")).unwrap();

        assert!(matches!(
            store.get("m2", "1.0").await,
            Err(KmError::RecordConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_history_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let store = VersionStore::new(tmp.path().join("nope"));
        assert!(store.history("m1").await.unwrap().is_empty());
    }
}
