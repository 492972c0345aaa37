//! Runtime configuration.
//!
//! Values are resolved from environment variables with local defaults,
//! and CLI flags may override any of them.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::KmError;

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default dimensionality of the hash embedder.
pub const DEFAULT_DIMENSIONS: usize = 128;

/// Default Ollama API URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Ollama embedding model.
pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";

/// Which embedding strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderKind {
    /// Deterministic hash-based placeholder vectors.
    #[default]
    Hash,
    /// Ollama HTTP embedding model.
    Ollama,
}

impl EmbedderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Ollama => "ollama",
        }
    }
}

impl FromStr for EmbedderKind {
    type Err = KmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "ollama" => Ok(Self::Ollama),
            other => Err(KmError::Config(format!(
                "Invalid embedder '{}'. Use: hash, ollama",
                other
            ))),
        }
    }
}

/// Index and tracker configuration.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub data_dir: PathBuf,
    pub embedder: EmbedderKind,
    pub dimensions: usize,
    pub ollama_url: String,
    pub ollama_model: String,
    pub review_webhook: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            embedder: EmbedderKind::default(),
            dimensions: DEFAULT_DIMENSIONS,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            review_webhook: None,
        }
    }
}

impl IndexConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, KmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, KmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let embedder = match lookup("KMINDEX_EMBEDDER") {
            Some(value) => value.parse()?,
            None => defaults.embedder,
        };

        let dimensions = match lookup("KMINDEX_DIMENSIONS") {
            Some(value) => {
                let dims: usize = value.trim().parse().map_err(|_| {
                    KmError::Config(format!("KMINDEX_DIMENSIONS must be a number, got '{}'", value))
                })?;
                if dims == 0 {
                    return Err(KmError::Config("KMINDEX_DIMENSIONS must be positive".to_string()));
                }
                dims
            }
            None => defaults.dimensions,
        };

        let config = Self {
            data_dir: lookup("KMINDEX_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            embedder,
            dimensions,
            ollama_url: lookup("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: lookup("OLLAMA_EMBED_MODEL").unwrap_or(defaults.ollama_model),
            review_webhook: lookup("KMINDEX_REVIEW_WEBHOOK").filter(|url| !url.trim().is_empty()),
        };

        debug!(
            data_dir = %config.data_dir.display(),
            embedder = config.embedder.as_str(),
            dimensions = config.dimensions,
            "Configuration resolved"
        );

        Ok(config)
    }

    /// Use a different data directory.
    pub fn with_data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        self.data_dir = data_dir.as_ref().to_path_buf();
        self
    }

    /// Path of the embedding snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("embeddings.json")
    }

    /// Directory holding one file per module version.
    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }

    /// Directory of processed module JSON files (the module store).
    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    /// Append-only change log.
    pub fn changelog_path(&self) -> PathBuf {
        self.data_dir.join("changes.jsonl")
    }
}
