//! Batch ingestion and change detection commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use kmindex_core::KnowledgeModule;
use tracing::warn;

use super::AppContext;
use crate::output;

#[derive(Args)]
pub struct IngestArgs {
    /// JSON file holding one module or an array of modules
    pub batch: PathBuf,

    /// Only detect changes; do not touch the embedding index
    #[arg(long)]
    pub no_index: bool,
}

/// Parse a batch file: a single module object or an array of modules.
pub fn load_batch(path: &Path) -> Result<Vec<KnowledgeModule>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;

    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;

    let modules = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(modules)
}

pub async fn execute_ingest(ctx: &AppContext, args: IngestArgs) -> Result<()> {
    let modules = load_batch(&args.batch)?;
    println!("{} {} modules from {}", "Ingesting".dimmed(), modules.len(), args.batch.display());

    let report = ctx.tracker.detect_changes(&modules).await;
    output::print_change_report(&report);

    // Keep the module store current so reindex sees the latest content.
    for module in modules.iter().filter(|m| !m.id.trim().is_empty()) {
        if let Err(e) = ctx.source.save(module).await {
            warn!(module_id = %module.id, error = %e, "Failed to save processed module");
        }
    }

    if args.no_index {
        return Ok(());
    }

    let indexed = ctx.pipeline.index_batch(&modules).await;
    println!(
        "{} Indexed {} modules ({} failed), {} vectors total",
        "✓".green().bold(),
        indexed.indexed,
        indexed.failed,
        ctx.pipeline.index().stats().total_vectors
    );

    Ok(())
}

pub async fn execute_detect(ctx: &AppContext) -> Result<()> {
    let report = ctx.tracker.detect_changes_in_dir(&ctx.config.processed_dir()).await;
    output::print_change_report(&report);
    Ok(())
}
