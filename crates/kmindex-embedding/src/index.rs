//! In-memory embedding index.
//!
//! Records are kept in insertion order behind a single `RwLock`; every
//! mutation is applied under the write lock so searches never observe a
//! partially applied store. When a snapshot path is configured, each
//! mutation rewrites the full snapshot. Snapshot writes are serialized by a
//! separate async mutex and their failures are logged, never returned: the
//! in-memory index stays authoritative for the life of the process.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use kmindex_core::{KmError, KmResult, Language};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::similarity::cosine_similarity;
use crate::snapshot;

/// Metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub module_id: String,
    pub language: Language,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub version: String,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingMetadata {
    pub fn new(module_id: impl Into<String>, language: Language) -> Self {
        Self {
            module_id: module_id.into(),
            language,
            source_url: String::new(),
            version: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = source_url.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// A stored vector with its key and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: EmbeddingMetadata,
}

impl EmbeddingRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, metadata: EmbeddingMetadata) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata,
        }
    }
}

/// Key of the record holding one language variant of a module.
pub fn variant_key(module_id: &str, language: Language) -> String {
    format!("{}_{}", module_id, language.as_str())
}

/// Restricts which stored records a search considers.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Only records whose metadata language matches.
    pub language: Option<Language>,
    /// Accepted but not applied: records carry no category metadata.
    pub category: Option<String>,
}

impl SearchFilter {
    pub fn language(language: Language) -> Self {
        Self {
            language: Some(language),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    fn matches(&self, metadata: &EmbeddingMetadata) -> bool {
        self.language.is_none_or(|language| metadata.language == language)
    }
}

/// A ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityHit {
    pub id: String,
    pub similarity: f32,
    pub metadata: EmbeddingMetadata,
}

/// Index statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_vectors: usize,
}

#[derive(Debug, Default)]
struct IndexState {
    records: Vec<EmbeddingRecord>,
    positions: HashMap<String, usize>,
}

impl IndexState {
    fn from_records(records: Vec<EmbeddingRecord>) -> Self {
        let mut state = Self::default();
        for record in records {
            state.upsert(record);
        }
        state
    }

    /// Overwrites keep the record's original position.
    fn upsert(&mut self, record: EmbeddingRecord) {
        match self.positions.get(&record.id) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn retain<F>(&mut self, keep: F) -> usize
    where
        F: Fn(&EmbeddingRecord) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|r| keep(r));
        let removed = before - self.records.len();
        if removed > 0 {
            self.positions = self
                .records
                .iter()
                .enumerate()
                .map(|(pos, r)| (r.id.clone(), pos))
                .collect();
        }
        removed
    }
}

/// Embedding index with optional snapshot persistence.
#[derive(Debug, Default)]
pub struct EmbeddingIndex {
    state: RwLock<IndexState>,
    snapshot_path: Option<PathBuf>,
    persist_lock: tokio::sync::Mutex<()>,
}

impl EmbeddingIndex {
    /// Create an empty, memory-only index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index that rewrites `path` on every mutation.
    pub fn with_snapshot(path: impl AsRef<Path>) -> Self {
        Self {
            snapshot_path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Open an index backed by `path`, restoring its snapshot if one exists.
    ///
    /// A missing snapshot yields an empty index; an unreadable or corrupt one
    /// is logged and also yields an empty index.
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let index = Self::with_snapshot(path);
        index.load().await;
        index
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or overwrite the record at `id`.
    ///
    /// The vector length is not checked against existing records here; a
    /// mismatch surfaces when a search compares against it.
    pub async fn store(&self, id: &str, vector: Vec<f32>, metadata: EmbeddingMetadata) {
        {
            let mut state = self.write_state();
            state.upsert(EmbeddingRecord::new(id, vector, metadata));
        }
        debug!(id = %id, "Stored embedding");
        self.persist_logged().await;
    }

    /// Store both language variants of a module under `<id>_<language>` keys.
    ///
    /// Both records are applied in one write-lock scope and persisted once.
    pub async fn store_bilingual(
        &self,
        id: &str,
        vector_a: Vec<f32>,
        vector_b: Vec<f32>,
        metadata_a: EmbeddingMetadata,
        metadata_b: EmbeddingMetadata,
    ) {
        let key_a = variant_key(id, metadata_a.language);
        let key_b = variant_key(id, metadata_b.language);
        {
            let mut state = self.write_state();
            state.upsert(EmbeddingRecord::new(key_a.clone(), vector_a, metadata_a));
            state.upsert(EmbeddingRecord::new(key_b.clone(), vector_b, metadata_b));
        }
        debug!(id = %id, key_a = %key_a, key_b = %key_b, "Stored bilingual embeddings");
        self.persist_logged().await;
    }

    /// Replace every record of `module_id` with `records`.
    ///
    /// Keys present in `records` are overwritten in place; other records of
    /// the module are dropped as stale.
    pub async fn replace_module(&self, module_id: &str, records: Vec<EmbeddingRecord>) -> usize {
        let dropped = {
            let mut state = self.write_state();
            let fresh: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
            let dropped =
                state.retain(|r| r.metadata.module_id != module_id || fresh.contains(&r.id));
            for record in records {
                state.upsert(record);
            }
            dropped
        };
        debug!(module_id = %module_id, dropped, "Replaced module embeddings");
        self.persist_logged().await;
        dropped
    }

    /// Swap the whole record set for `records`.
    pub async fn replace_all(&self, records: Vec<EmbeddingRecord>) {
        let total = {
            let mut state = self.write_state();
            *state = IndexState::from_records(records);
            state.records.len()
        };
        info!(total, "Index rebuilt");
        self.persist_logged().await;
    }

    /// Get the record stored at `id`.
    pub fn get(&self, id: &str) -> Option<EmbeddingRecord> {
        let state = self.read_state();
        state.positions.get(id).map(|&pos| state.records[pos].clone())
    }

    /// Rank stored vectors by cosine similarity to `query`.
    ///
    /// Returns at most `top_k` hits in descending similarity; equal scores keep
    /// insertion order. Fails if any candidate vector's length differs from
    /// the query's.
    pub fn find_similar(
        &self,
        query: &[f32],
        top_k: usize,
        filter: &SearchFilter,
    ) -> KmResult<Vec<SimilarityHit>> {
        if let Some(category) = &filter.category {
            debug!(category = %category, "Category filter ignored: records carry no category");
        }

        let mut hits = {
            let state = self.read_state();
            let mut hits = Vec::with_capacity(state.records.len());
            for record in state.records.iter().filter(|r| filter.matches(&r.metadata)) {
                if record.vector.len() != query.len() {
                    return Err(KmError::DimensionMismatch {
                        id: record.id.clone(),
                        expected: query.len(),
                        found: record.vector.len(),
                    });
                }
                hits.push(SimilarityHit {
                    id: record.id.clone(),
                    similarity: cosine_similarity(query, &record.vector),
                    metadata: record.metadata.clone(),
                });
            }
            hits
        };

        // Stable sort: ties stay in insertion order.
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(top_k);

        Ok(hits)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_vectors: self.read_state().records.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.read_state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().records.is_empty()
    }

    /// Ids of all records, in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.read_state().records.iter().map(|r| r.id.clone()).collect()
    }

    /// Write the full record set to the snapshot.
    ///
    /// Does nothing for a memory-only index.
    pub async fn persist(&self) -> KmResult<()> {
        let Some(path) = self.snapshot_path.as_deref() else {
            return Ok(());
        };

        let _guard = self.persist_lock.lock().await;
        let records = self.read_state().records.clone();
        snapshot::write_snapshot(path, &records).await?;
        debug!(path = %path.display(), total = records.len(), "Persisted embedding snapshot");
        Ok(())
    }

    async fn persist_logged(&self) {
        if let Err(e) = self.persist().await {
            warn!(error = %e, "Failed to persist embedding snapshot; in-memory index remains authoritative");
        }
    }

    /// Replace the in-memory records with the snapshot contents.
    ///
    /// Returns the number of records loaded. Any failure is logged and leaves
    /// the index empty.
    pub async fn load(&self) -> usize {
        let Some(path) = self.snapshot_path.as_deref() else {
            return 0;
        };

        let records = match snapshot::read_snapshot(path).await {
            Ok(Some(records)) => records,
            Ok(None) => {
                debug!(path = %path.display(), "No embedding snapshot found; starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load embedding snapshot; starting empty");
                Vec::new()
            }
        };

        let total = {
            let mut state = self.write_state();
            *state = IndexState::from_records(records);
            state.records.len()
        };
        info!(path = %path.display(), total, "Loaded embedding index");
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(module_id: &str, language: Language) -> EmbeddingMetadata {
        EmbeddingMetadata::new(module_id, language).with_version("1.0")
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let index = EmbeddingIndex::new();
        index.store("a", vec![1.0, 0.0], meta("a", Language::En)).await;

        let record = index.get("a").unwrap();
        assert_eq!(record.vector, vec![1.0, 0.0]);
        assert_eq!(record.metadata.module_id, "a");
        assert!(index.get("b").is_none());
        assert_eq!(index.stats().total_vectors, 1);
    }

    #[tokio::test]
    async fn test_store_overwrites_in_place() {
        let index = EmbeddingIndex::new();
        index.store("a", vec![1.0, 0.0], meta("a", Language::En)).await;
        index.store("b", vec![0.0, 1.0], meta("b", Language::En)).await;
        index.store("a", vec![0.5, 0.5], meta("a", Language::En)).await;

        assert_eq!(index.len(), 2);
        assert_eq!(index.ids(), vec!["a", "b"]);
        assert_eq!(index.get("a").unwrap().vector, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_store_bilingual_keys() {
        let index = EmbeddingIndex::new();
        index
            .store_bilingual(
                "m1",
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                meta("m1", Language::En),
                meta("m1", Language::Am),
            )
            .await;

        assert_eq!(index.ids(), vec!["m1_en", "m1_am"]);
        assert_eq!(index.get("m1_am").unwrap().metadata.language, Language::Am);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readers_never_see_half_a_bilingual_store() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let index = Arc::new(EmbeddingIndex::new());
        let done = Arc::new(AtomicBool::new(false));

        let reader = {
            let index = index.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let mut observations = 0usize;
                while !done.load(Ordering::Acquire) {
                    let ids = index.ids();
                    assert_eq!(ids.len() % 2, 0, "partial bilingual store visible: {:?}", ids);
                    for id in ids.iter().filter(|id| id.ends_with("_en")) {
                        let am = format!("{}_am", id.trim_end_matches("_en"));
                        assert!(ids.contains(&am), "{} visible without {}", id, am);
                    }
                    observations += 1;
                    tokio::task::yield_now().await;
                }
                observations
            })
        };

        for i in 0..200 {
            let id = format!("m{}", i);
            index
                .store_bilingual(
                    &id,
                    vec![1.0, 0.0],
                    vec![0.0, 1.0],
                    meta(&id, Language::En),
                    meta(&id, Language::Am),
                )
                .await;
            tokio::task::yield_now().await;
        }
        done.store(true, Ordering::Release);

        assert!(reader.await.unwrap() > 0);
        assert_eq!(index.len(), 400);
    }

    #[tokio::test]
    async fn test_non_finite_vectors_rank_without_panicking() {
        let index = EmbeddingIndex::new();
        index.store("nan", vec![f32::NAN, 1.0], meta("nan", Language::En)).await;
        index.store("inf", vec![f32::INFINITY, 0.0], meta("inf", Language::En)).await;
        index.store("good", vec![1.0, 0.0], meta("good", Language::En)).await;
        index.store("other", vec![0.0, 1.0], meta("other", Language::En)).await;

        let hits = index.find_similar(&[1.0, 0.0], 4, &SearchFilter::default()).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "nan", "inf", "other"]);
        assert!(hits.iter().all(|h| h.similarity.is_finite()));
    }

    #[tokio::test]
    async fn test_find_similar_ranks_closest_first() {
        let index = EmbeddingIndex::new();
        index.store("far", vec![0.0, 0.0, 1.0], meta("far", Language::En)).await;
        index.store("near", vec![0.9, 0.1, 0.0], meta("near", Language::En)).await;
        index.store("mid", vec![0.5, 0.5, 0.5], meta("mid", Language::En)).await;

        let hits = index.find_similar(&[1.0, 0.0, 0.0], 10, &SearchFilter::default()).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[tokio::test]
    async fn test_find_similar_top_k_and_ties_keep_insertion_order() {
        let index = EmbeddingIndex::new();
        for id in ["x", "y", "z"] {
            index.store(id, vec![1.0, 1.0], meta(id, Language::En)).await;
        }

        let hits = index.find_similar(&[1.0, 1.0], 2, &SearchFilter::default()).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "x");
        assert_eq!(hits[1].id, "y");
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_find_similar_length_mismatch() {
        let index = EmbeddingIndex::new();
        index.store("a", vec![1.0, 0.0, 0.0, 0.0], meta("a", Language::En)).await;

        let err = index
            .find_similar(&[1.0, 0.0, 0.0, 0.0, 0.0], 5, &SearchFilter::default())
            .unwrap_err();
        assert!(matches!(
            err,
            KmError::DimensionMismatch { expected: 5, found: 4, .. }
        ));
        assert!(err.is_input_error());
    }

    #[tokio::test]
    async fn test_language_filter() {
        let index = EmbeddingIndex::new();
        index
            .store_bilingual(
                "m1",
                vec![1.0, 0.0],
                vec![1.0, 0.0],
                meta("m1", Language::En),
                meta("m1", Language::Am),
            )
            .await;

        let hits = index
            .find_similar(&[1.0, 0.0], 10, &SearchFilter::language(Language::Am))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "m1_am");
    }

    #[tokio::test]
    async fn test_filtered_out_records_skip_length_check() {
        let index = EmbeddingIndex::new();
        index.store("en", vec![1.0, 0.0], meta("m", Language::En)).await;
        index.store("am", vec![1.0, 0.0, 0.0], meta("m", Language::Am)).await;

        let hits = index
            .find_similar(&[1.0, 0.0], 10, &SearchFilter::language(Language::En))
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_category_filter_is_no_op() {
        let index = EmbeddingIndex::new();
        index.store("a", vec![1.0, 0.0], meta("a", Language::En)).await;

        let filter = SearchFilter::default().with_category("identity");
        assert_eq!(index.find_similar(&[1.0, 0.0], 10, &filter).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_vectors_score_zero() {
        let index = EmbeddingIndex::new();
        index.store("zero", vec![0.0, 0.0], meta("zero", Language::En)).await;

        let hits = index.find_similar(&[0.0, 0.0], 1, &SearchFilter::default()).unwrap();
        assert_eq!(hits[0].similarity, 0.0);
    }

    #[tokio::test]
    async fn test_replace_module_drops_stale_records() {
        let index = EmbeddingIndex::new();
        index
            .store_bilingual(
                "m1",
                vec![1.0],
                vec![1.0],
                meta("m1", Language::En),
                meta("m1", Language::Am),
            )
            .await;
        index.store("m2_en", vec![1.0], meta("m2", Language::En)).await;

        let dropped = index
            .replace_module(
                "m1",
                vec![EmbeddingRecord::new("m1_en", vec![0.5], meta("m1", Language::En))],
            )
            .await;

        assert_eq!(dropped, 1);
        assert_eq!(index.ids(), vec!["m1_en", "m2_en"]);
        assert_eq!(index.get("m1_en").unwrap().vector, vec![0.5]);
    }

    #[tokio::test]
    async fn test_persist_and_reload_answers_identically() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("embeddings.json");

        let index = EmbeddingIndex::with_snapshot(&path);
        index.store("a", vec![1.0, 0.0, 0.0], meta("a", Language::En)).await;
        index.store("b", vec![0.7, 0.7, 0.0], meta("b", Language::Am)).await;
        index.store("c", vec![0.7, 0.7, 0.0], meta("c", Language::En)).await;
        let query = [0.6, 0.8, 0.0];
        let before = index.find_similar(&query, 3, &SearchFilter::default()).unwrap();

        let reloaded = EmbeddingIndex::open(&path).await;
        let after = reloaded.find_similar(&query, 3, &SearchFilter::default()).unwrap();

        assert_eq!(reloaded.ids(), index.ids());
        let ids = |hits: &[SimilarityHit]| hits.iter().map(|h| h.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&before), ids(&after));
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.similarity, a.similarity);
            assert_eq!(b.metadata, a.metadata);
        }
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("embeddings.json");
        std::fs::write(&path, b"[not a snapshot").unwrap();

        let index = EmbeddingIndex::open(&path).await;
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_state() {
        let tmp = TempDir::new().unwrap();
        // A directory where the snapshot file should be makes every write fail.
        let path = tmp.path().join("embeddings.json");
        std::fs::create_dir_all(&path).unwrap();

        let index = EmbeddingIndex::with_snapshot(&path);
        index.store("a", vec![1.0], meta("a", Language::En)).await;
        assert_eq!(index.len(), 1);
        assert!(index.persist().await.is_err());
    }
}
