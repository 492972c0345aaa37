//! Version history and change-log commands.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::AppContext;
use crate::output;

#[derive(Args)]
pub struct HistoryArgs {
    /// Module id
    pub module_id: String,
}

#[derive(Args)]
pub struct ChangesArgs {
    /// Maximum number of entries
    #[arg(long, default_value = "20")]
    pub limit: usize,
}

pub async fn execute_history(ctx: &AppContext, args: HistoryArgs) -> Result<()> {
    let history = ctx.tracker.module_history(&args.module_id).await;

    if history.is_empty() {
        println!("{}", format!("No versions recorded for '{}'.", args.module_id).dimmed());
        return Ok(());
    }

    println!("{} {}", args.module_id.cyan().bold(), format!("({} versions)", history.len()).dimmed());
    output::print_history(&history);
    Ok(())
}

pub async fn execute_changes(ctx: &AppContext, args: ChangesArgs) -> Result<()> {
    let entries = ctx.tracker.changelog().recent(args.limit).await?;

    if entries.is_empty() {
        println!("{}", "No changes recorded.".dimmed());
        return Ok(());
    }

    output::print_changes(&entries);
    Ok(())
}
