//! # KMIndex Embedding
//!
//! Text embeddings and an in-memory vector index with snapshot persistence.
//!
//! Provides pluggable embedders (hash placeholder or Ollama), cosine top-K
//! search with language filtering, and the pipeline that keeps the index in
//! step with the module store (bilingual indexing, reindex, rebuild).

pub mod embedder;
pub mod index;
pub mod ollama;
pub mod pipeline;
pub mod similarity;
pub mod snapshot;

pub use embedder::{build_embedder, HashEmbedder, TextEmbedder};
pub use index::{EmbeddingIndex, EmbeddingMetadata, EmbeddingRecord, IndexStats, SearchFilter, SimilarityHit};
pub use ollama::OllamaEmbedder;
pub use pipeline::{BatchIndexReport, IndexPipeline, IndexedModule, ReindexRequest};
pub use similarity::cosine_similarity;
