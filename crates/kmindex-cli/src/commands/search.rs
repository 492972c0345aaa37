//! Similarity search command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use kmindex_core::Language;
use kmindex_embedding::SearchFilter;

use super::AppContext;
use crate::output;

#[derive(Args)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Number of results to return
    #[arg(long, default_value = "5")]
    pub top_k: usize,

    /// Only search one language variant (en, am)
    #[arg(long, short)]
    pub language: Option<String>,

    /// Category filter (accepted, not yet applied)
    #[arg(long)]
    pub category: Option<String>,
}

pub async fn execute(ctx: &AppContext, args: SearchArgs) -> Result<()> {
    let filter = SearchFilter {
        language: args.language.as_deref().map(str::parse::<Language>).transpose()?,
        category: args.category,
    };

    let hits = ctx.pipeline.search(&args.query, args.top_k, &filter).await?;

    if hits.is_empty() {
        println!("{}", "No results found.".dimmed());
        return Ok(());
    }

    println!("{} Found {} results:", "✓".green().bold(), hits.len());
    output::print_hits_table(&hits);
    Ok(())
}
