//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kmindex_core::{EmbedderKind, IndexConfig, LogNotifier, ProcessedModuleDir, ReviewNotifier, WebhookNotifier};
use kmindex_embedding::{build_embedder, EmbeddingIndex, IndexPipeline};
use kmindex_versioning::{ChangeLog, VersionStore, VersionTracker};

pub mod history;
pub mod index;
pub mod ingest;
pub mod search;

/// KMIndex - embedding index and change tracking for knowledge modules
#[derive(Parser)]
#[command(name = "kmindex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (snapshot, versions, processed modules, change log)
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Embedding strategy: hash or ollama
    #[arg(short, long, global = true)]
    pub embedder: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true, env = "KMINDEX_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest a scrape batch: detect changes, then embed every module
    Ingest(ingest::IngestArgs),

    /// Detect changes across the processed-module directory
    Detect,

    /// Semantic search over indexed modules
    Search(search::SearchArgs),

    /// Regenerate embeddings for the given modules
    Reindex(index::ReindexArgs),

    /// Clear the index and re-embed every stored module
    Rebuild,

    /// Show index statistics
    Stats,

    /// Show the version history of a module
    History(history::HistoryArgs),

    /// Show recent change-log entries
    Changes(history::ChangesArgs),
}

impl Cli {
    /// Resolve configuration: environment first, then command-line overrides.
    fn config(&self) -> Result<IndexConfig> {
        let mut config = IndexConfig::from_env()?;
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
        }
        if let Some(embedder) = &self.embedder {
            config.embedder = embedder.parse::<EmbedderKind>()?;
        }
        Ok(config)
    }

    pub async fn execute(self) -> Result<()> {
        let config = self.config()?;
        let ctx = AppContext::open(config).await;

        match self.command {
            Commands::Ingest(args) => ingest::execute_ingest(&ctx, args).await,
            Commands::Detect => ingest::execute_detect(&ctx).await,
            Commands::Search(args) => search::execute(&ctx, args).await,
            Commands::Reindex(args) => index::execute_reindex(&ctx, args).await,
            Commands::Rebuild => index::execute_rebuild(&ctx).await,
            Commands::Stats => index::execute_stats(&ctx),
            Commands::History(args) => history::execute_history(&ctx, args).await,
            Commands::Changes(args) => history::execute_changes(&ctx, args).await,
        }
    }
}

/// Everything a command needs, wired from configuration.
pub struct AppContext {
    pub config: IndexConfig,
    pub source: ProcessedModuleDir,
    pub pipeline: IndexPipeline,
    pub tracker: VersionTracker,
}

impl AppContext {
    pub async fn open(config: IndexConfig) -> Self {
        let index = Arc::new(EmbeddingIndex::open(config.snapshot_path()).await);
        let embedder = build_embedder(&config);
        let source = ProcessedModuleDir::new(config.processed_dir());
        let pipeline = IndexPipeline::new(index, embedder, Arc::new(source.clone()));

        let notifier: Arc<dyn ReviewNotifier> = match &config.review_webhook {
            Some(url) => Arc::new(WebhookNotifier::new(url)),
            None => Arc::new(LogNotifier),
        };
        let tracker = VersionTracker::new(
            VersionStore::new(config.versions_dir()),
            ChangeLog::new(config.changelog_path()),
            notifier,
        );

        Self {
            config,
            source,
            pipeline,
            tracker,
        }
    }
}
