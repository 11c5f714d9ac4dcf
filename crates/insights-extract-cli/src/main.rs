//! Daily batch job: extract one day's rows from the insights snapshot archive.

mod config;
mod download;
mod error;

use clap::Parser;
use insights_extract_core::{RunSummary, TargetDate, run};
use log::info;
use snafu::ResultExt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::{ArchiveSource, Cli},
    download::fetch_archive,
    error::{CliResult, PipelineSnafu, ReadArchiveSnafu},
};

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn print_summary(summary: &RunSummary) {
    for path in &summary.documents {
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &summary.error_log {
        println!("Wrote error log {}", path.display());
    }
    println!(
        "{}: {} rows in {} documents ({} files, {} failed)",
        summary.target_date,
        summary.rows_written,
        summary.documents.len(),
        summary.files_seen,
        summary.files_failed
    );
}

async fn read_archive(source: &ArchiveSource, date: TargetDate) -> CliResult<Vec<u8>> {
    match source {
        ArchiveSource::Local(path) => {
            let bytes = tokio::fs::read(path).await.context(ReadArchiveSnafu {
                path: path.display().to_string(),
            })?;
            info!("read {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        ArchiveSource::Remote(remote) => fetch_archive(remote, date).await,
    }
}

async fn run_cli() -> CliResult<()> {
    let cli = Cli::parse();
    let target_date = cli.target_date(chrono::Local::now().date_naive())?;

    let archive = read_archive(&cli.archive_source()?, target_date).await?;

    let config = cli.run_config(target_date);
    let summary = run(&archive, &config).await.context(PipelineSnafu)?;
    print_summary(&summary);
    Ok(())
}

#[tokio::main]
async fn main() {
    init_logging();
    if let Err(e) = run_cli().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
