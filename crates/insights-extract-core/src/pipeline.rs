//! One extraction run, from archive bytes to written documents.
//!
//! All run-scoped settings travel in a [`RunConfig`]; nothing is read from
//! process-wide state. The pipeline is strictly sequential: archive scan,
//! aggregation (one file at a time), rendering, then writing.

use std::path::{Path, PathBuf};

use log::info;
use snafu::prelude::*;

use crate::{
    aggregate::{AggregateReport, aggregate},
    archive,
    emit::{ERROR_DOCUMENT_NAME, render, write_documents},
    error::{ArchiveSnafu, EmitSnafu, PipelineResult, StorageSnafu},
    policy::PolicyTable,
    storage::ensure_dir,
    temporal::TargetDate,
};

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Calendar date rows are filtered against.
    pub target_date: TargetDate,
    /// Directory receiving one JSON document per category.
    pub output_dir: PathBuf,
    /// Destination of the consolidated error document.
    pub error_log_path: PathBuf,
    /// Per-category filter policies.
    pub policies: PolicyTable,
}

impl RunConfig {
    /// Config with the default policy table and `error.json` inside `output_dir`.
    pub fn new(target_date: TargetDate, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        let error_log_path = output_dir.join(ERROR_DOCUMENT_NAME);
        RunConfig {
            target_date,
            output_dir,
            error_log_path,
            policies: PolicyTable::default(),
        }
    }

    /// Write the error document to `path` instead of the output directory.
    pub fn with_error_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_log_path = path.into();
        self
    }

    /// Replace the policy table.
    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = policies;
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Date that was extracted.
    pub target_date: TargetDate,
    /// Category documents written, in category name order.
    pub documents: Vec<PathBuf>,
    /// Error document, if any file failed.
    pub error_log: Option<PathBuf>,
    /// Payloads processed.
    pub files_seen: usize,
    /// Payloads that failed and were recorded in the error log.
    pub files_failed: usize,
    /// Sum of filtered rows across all written documents.
    pub rows_written: usize,
}

impl RunSummary {
    /// Whether every payload was processed without a recorded failure.
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0
    }
}

/// Scan the archive and aggregate it without touching the filesystem.
///
/// # Errors
///
/// Only a fatal archive error is returned; per-file failures are in the
/// report's error log.
pub fn extract(archive_bytes: &[u8], config: &RunConfig) -> PipelineResult<AggregateReport> {
    let groups = archive::open(archive_bytes).context(ArchiveSnafu)?;
    Ok(aggregate(&groups, config.target_date, &config.policies))
}

/// Run the whole pipeline and write its documents.
///
/// # Errors
///
/// Fails on an unreadable archive, a rendering error, or a write error.
/// File-level failures do not fail the run; they are written to the error
/// document and counted in [`RunSummary::files_failed`].
pub async fn run(archive_bytes: &[u8], config: &RunConfig) -> PipelineResult<RunSummary> {
    info!("extracting rows for {}", config.target_date);

    let report = extract(archive_bytes, config)?;
    let emission = render(&report, config.target_date).context(EmitSnafu)?;

    ensure_output_dir(&config.output_dir).await?;
    let written = write_documents(&emission, &config.output_dir, &config.error_log_path).await?;

    let rows_written: usize = report
        .categories
        .values()
        .map(|c| c.total_filtered_rows)
        .sum();

    info!(
        "run for {} finished: {} documents, {rows_written} rows, {}/{} files failed",
        config.target_date,
        written.categories.len(),
        report.files_failed,
        report.files_seen
    );

    Ok(RunSummary {
        target_date: config.target_date,
        documents: written.categories,
        error_log: written.errors,
        files_seen: report.files_seen,
        files_failed: report.files_failed,
        rows_written,
    })
}

async fn ensure_output_dir(dir: &Path) -> PipelineResult<()> {
    ensure_dir(dir).await.context(StorageSnafu {
        path: dir.display().to_string(),
    })
}
