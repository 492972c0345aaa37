//! Index maintenance commands.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use kmindex_embedding::ReindexRequest;

use super::AppContext;

#[derive(Args)]
pub struct ReindexArgs {
    /// Module ids to reindex
    pub module_ids: Vec<String>,
}

pub async fn execute_reindex(ctx: &AppContext, args: ReindexArgs) -> Result<()> {
    let request = ReindexRequest::new(args.module_ids);
    let processed = ctx.pipeline.reindex(&request).await?;

    println!(
        "{} Reindexed {} modules ({} vectors total)",
        "✓".green().bold(),
        processed,
        ctx.pipeline.index().stats().total_vectors
    );
    Ok(())
}

pub async fn execute_rebuild(ctx: &AppContext) -> Result<()> {
    println!("{}", "Rebuilding index from module store...".dimmed());
    let rebuilt = ctx.pipeline.rebuild().await?;

    println!(
        "{} Rebuilt index from {} modules ({} vectors)",
        "✓".green().bold(),
        rebuilt,
        ctx.pipeline.index().stats().total_vectors
    );
    Ok(())
}

pub fn execute_stats(ctx: &AppContext) -> Result<()> {
    let stats = ctx.pipeline.index().stats();

    println!("{}", "Embedding Index".cyan().bold());
    println!("  {}: {}", "Vectors".bold(), stats.total_vectors);
    println!("  {}: {}", "Embedder".bold(), ctx.pipeline.embedder().model_name());
    println!("  {}: {}", "Snapshot".bold(), ctx.config.snapshot_path().display());
    Ok(())
}
