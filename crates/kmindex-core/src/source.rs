//! Module store interface.
//!
//! The relational module store lives outside this workspace; the index and
//! tracker only need to fetch the current content of a module by id and to
//! enumerate all modules. `ProcessedModuleDir` implements this over the
//! directory of processed module JSON files written by the ingestion pipeline.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::KmResult;
use crate::module::model::KnowledgeModule;
use crate::module::storage_key;

/// Source of the current content of knowledge modules.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Fetch the current content of a module.
    async fn fetch(&self, module_id: &str) -> KmResult<Option<KnowledgeModule>>;

    /// List every module currently known.
    async fn list(&self) -> KmResult<Vec<KnowledgeModule>>;
}

/// Directory of processed module files, one `<module_id>.json` per module.
///
/// A file may also hold an array of modules (a whole scrape batch).
#[derive(Debug, Clone)]
pub struct ProcessedModuleDir {
    dir: PathBuf,
}

impl ProcessedModuleDir {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a module to `<dir>/<module_id>.json`, creating the directory if needed.
    pub async fn save(&self, module: &KnowledgeModule) -> KmResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.json", storage_key(&module.id)));
        let json = serde_json::to_vec_pretty(module)?;
        tokio::fs::write(&path, json).await?;
        debug!(module_id = %module.id, path = %path.display(), "Saved processed module");
        Ok(())
    }

    async fn read_file(path: &Path) -> Option<Vec<KnowledgeModule>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable module file");
                return None;
            }
        };

        if let Ok(module) = serde_json::from_slice::<KnowledgeModule>(&bytes) {
            return Some(vec![module]);
        }
        match serde_json::from_slice::<Vec<KnowledgeModule>>(&bytes) {
            Ok(modules) => Some(modules),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping malformed module file");
                None
            }
        }
    }
}

#[async_trait]
impl ModuleSource for ProcessedModuleDir {
    async fn fetch(&self, module_id: &str) -> KmResult<Option<KnowledgeModule>> {
        let path = self.dir.join(format!("{}.json", storage_key(module_id)));
        if let Some(modules) = Self::read_file(&path).await {
            if let Some(found) = modules.into_iter().find(|m| m.id == module_id) {
                return Ok(Some(found));
            }
        }

        // The file name need not match the id; fall back to a scan.
        Ok(self.list().await?.into_iter().find(|m| m.id == module_id))
    }

    async fn list(&self) -> KmResult<Vec<KnowledgeModule>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "Processed module directory not readable");
                return Ok(Vec::new());
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut modules = Vec::new();
        for path in paths {
            if let Some(batch) = Self::read_file(&path).await {
                modules.extend(batch);
            }
        }
        Ok(modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_directory_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        let source = ProcessedModuleDir::new(tmp.path().join("nope"));
        assert!(source.list().await.unwrap().is_empty());
        assert!(source.fetch("m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_fetch() {
        let tmp = TempDir::new().unwrap();
        let source = ProcessedModuleDir::new(tmp.path());
        let module = KnowledgeModule::new("m1", "1.0", "Driving licence").with_body("Visit the office");
        source.save(&module).await.unwrap();

        let fetched = source.fetch("m1").await.unwrap().unwrap();
        assert_eq!(fetched, module);
    }

    #[tokio::test]
    async fn test_similar_ids_saved_to_separate_files() {
        let tmp = TempDir::new().unwrap();
        let source = ProcessedModuleDir::new(tmp.path());
        source.save(&KnowledgeModule::new("trade licence", "1.0", "Spaced")).await.unwrap();
        source.save(&KnowledgeModule::new("trade_licence", "1.0", "Underscored")).await.unwrap();

        assert_eq!(source.list().await.unwrap().len(), 2);
        assert_eq!(source.fetch("trade licence").await.unwrap().unwrap().title, "Spaced");
        assert_eq!(source.fetch("trade_licence").await.unwrap().unwrap().title, "Underscored");
    }

    #[tokio::test]
    async fn test_batch_file_and_malformed_file() {
        let tmp = TempDir::new().unwrap();
        let batch = vec![
            KnowledgeModule::new("a", "1.0", "A"),
            KnowledgeModule::new("b", "1.0", "B"),
        ];
        std::fs::write(tmp.path().join("batch.json"), serde_json::to_vec(&batch).unwrap()).unwrap();
        std::fs::write(tmp.path().join("broken.json"), b"{not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();

        let source = ProcessedModuleDir::new(tmp.path());
        let modules = source.list().await.unwrap();
        assert_eq!(modules.len(), 2);

        // Not stored under its own file name; found by scanning.
        assert_eq!(source.fetch("b").await.unwrap().unwrap().title, "B");
    }
}
