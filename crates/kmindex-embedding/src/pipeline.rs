//! Indexing pipeline.
//!
//! Keeps the embedding index in step with knowledge modules: embeds each
//! language variant of a module, stores the records, and regenerates them on
//! demand from the module store (reindex by id, or a full rebuild).

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use kmindex_core::module::{language_variants, validate};
use kmindex_core::{KmError, KmResult, KnowledgeModule, ModuleSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedder::TextEmbedder;
use crate::index::{variant_key, EmbeddingIndex, EmbeddingMetadata, EmbeddingRecord, SearchFilter, SimilarityHit};

/// Modules embedded concurrently by `index_batch`.
const BATCH_CONCURRENCY: usize = 4;

/// Result of indexing one module.
#[derive(Debug, Clone)]
pub struct IndexedModule {
    pub module_id: String,
    pub keys: Vec<String>,
    pub dimensions: usize,
}

/// Outcome of indexing a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchIndexReport {
    pub indexed: usize,
    pub failed: usize,
}

/// A request to regenerate the embeddings of named modules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReindexRequest {
    #[serde(default, alias = "moduleIds")]
    pub module_ids: Option<Vec<String>>,
}

impl ReindexRequest {
    pub fn new(module_ids: Vec<String>) -> Self {
        Self {
            module_ids: Some(module_ids),
        }
    }

    /// The de-duplicated ids to reindex, or an input error if the list is
    /// missing, empty or holds a blank id.
    pub fn validate(&self) -> KmResult<Vec<String>> {
        let ids = match &self.module_ids {
            Some(ids) if !ids.is_empty() => ids,
            _ => return Err(KmError::invalid_input("moduleIds must be a non-empty array")),
        };

        let mut unique: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.trim();
            if id.is_empty() {
                return Err(KmError::invalid_input("moduleIds must not contain blank ids"));
            }
            if !unique.iter().any(|u| u == id) {
                unique.push(id.to_string());
            }
        }
        Ok(unique)
    }
}

/// Pipeline that embeds modules into the index.
pub struct IndexPipeline {
    index: Arc<EmbeddingIndex>,
    embedder: Arc<dyn TextEmbedder>,
    source: Arc<dyn ModuleSource>,
}

impl IndexPipeline {
    pub fn new(
        index: Arc<EmbeddingIndex>,
        embedder: Arc<dyn TextEmbedder>,
        source: Arc<dyn ModuleSource>,
    ) -> Self {
        Self {
            index,
            embedder,
            source,
        }
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn embedder(&self) -> &dyn TextEmbedder {
        self.embedder.as_ref()
    }

    /// Embed every language variant of a module without storing anything.
    async fn build_records(&self, module: &KnowledgeModule) -> KmResult<Vec<EmbeddingRecord>> {
        validate(module)?;

        let mut records = Vec::with_capacity(2);
        for (language, text) in language_variants(module) {
            let vector = self.embedder.embed(&text).await?;
            let metadata = EmbeddingMetadata::new(&module.id, language)
                .with_source_url(&module.source_url)
                .with_version(&module.version);
            records.push(EmbeddingRecord::new(
                variant_key(&module.id, language),
                vector,
                metadata,
            ));
        }
        Ok(records)
    }

    /// Store the records built for `module`; both variants go in together.
    async fn store_records(&self, module: &KnowledgeModule, mut records: Vec<EmbeddingRecord>) -> IndexedModule {
        let keys: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let dimensions = records.first().map(|r| r.vector.len()).unwrap_or(0);

        if records.len() == 2 {
            let b = records.pop();
            let a = records.pop();
            if let (Some(a), Some(b)) = (a, b) {
                self.index
                    .store_bilingual(&module.id, a.vector, b.vector, a.metadata, b.metadata)
                    .await;
            }
        } else {
            for record in records {
                self.index.store(&record.id, record.vector, record.metadata).await;
            }
        }

        info!(module_id = %module.id, keys = ?keys, dimensions, "Module indexed");
        IndexedModule {
            module_id: module.id.clone(),
            keys,
            dimensions,
        }
    }

    /// Embed and store a module: one record per language variant.
    pub async fn index_module(&self, module: &KnowledgeModule) -> KmResult<IndexedModule> {
        let records = self.build_records(module).await?;
        Ok(self.store_records(module, records).await)
    }

    /// Index a batch of modules; failures are logged and counted, not fatal.
    ///
    /// Embedding runs concurrently, but records are stored in batch order so
    /// insertion order (and with it the search tie-break) does not depend on
    /// embedder latency.
    pub async fn index_batch(&self, modules: &[KnowledgeModule]) -> BatchIndexReport {
        let built: Vec<(&KnowledgeModule, KmResult<Vec<EmbeddingRecord>>)> = stream::iter(modules)
            .map(|module| async move { (module, self.build_records(module).await) })
            .buffered(BATCH_CONCURRENCY)
            .collect()
            .await;

        let mut report = BatchIndexReport::default();
        for (module, result) in built {
            match result {
                Ok(records) => {
                    self.store_records(module, records).await;
                    report.indexed += 1;
                }
                Err(e) => {
                    warn!(module_id = %module.id, error = %e, "Skipping module during indexing");
                    report.failed += 1;
                }
            }
        }
        info!(indexed = report.indexed, failed = report.failed, "Batch indexed");
        report
    }

    /// Embed `query` and rank stored records against it.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> KmResult<Vec<SimilarityHit>> {
        let query_vector = self.embedder.embed(query).await?;
        debug!(query, dim = query_vector.len(), "Generated query embedding");
        self.index.find_similar(&query_vector, top_k, filter)
    }

    /// Drop and regenerate the embeddings of the requested modules from
    /// their current content in the module store.
    ///
    /// Returns the number of modules reindexed. Unknown ids and modules that
    /// fail to embed are logged and skipped.
    pub async fn reindex(&self, request: &ReindexRequest) -> KmResult<usize> {
        let ids = request.validate()?;
        let mut processed = 0;

        for id in &ids {
            let module = match self.source.fetch(id).await {
                Ok(Some(module)) => module,
                Ok(None) => {
                    warn!(module_id = %id, "Module not found in store; skipping reindex");
                    continue;
                }
                Err(e) => {
                    warn!(module_id = %id, error = %e, "Failed to fetch module; skipping reindex");
                    continue;
                }
            };

            match self.build_records(&module).await {
                Ok(records) => {
                    self.index.replace_module(&module.id, records).await;
                    processed += 1;
                }
                Err(e) => {
                    warn!(module_id = %id, error = %e, "Failed to embed module; skipping reindex");
                }
            }
        }

        info!(requested = ids.len(), processed, "Reindex complete");
        Ok(processed)
    }

    /// Clear the index and re-embed every module the store lists.
    ///
    /// The new record set is built fully before it replaces the old one.
    pub async fn rebuild(&self) -> KmResult<usize> {
        let modules = self.source.list().await?;
        let mut records = Vec::with_capacity(modules.len() * 2);
        let mut rebuilt = 0;

        for module in &modules {
            match self.build_records(module).await {
                Ok(built) => {
                    records.extend(built);
                    rebuilt += 1;
                }
                Err(e) => warn!(module_id = %module.id, error = %e, "Skipping module during rebuild"),
            }
        }

        self.index.replace_all(records).await;
        Ok(rebuilt)
    }
}
