//! KMIndex CLI - knowledge module embedding index and change tracker.
//!
//! Ingests scrape batches, detects content changes, keeps the embedding
//! index current and answers similarity queries.

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::Cli;

/// Initialize tracing, optionally mirroring output to a log file.
///
/// Console output goes to stderr so command output on stdout stays clean.
/// The returned guard must stay alive for file output to be flushed.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kmindex=info,kmindex_embedding=info,kmindex_versioning=info".into());

    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let _ = std::fs::create_dir_all(dir);
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "kmindex.log".into());

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref());

    cli.execute().await
}
