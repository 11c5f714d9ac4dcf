//! Per-category accumulation of filtered rows and file failures.
//!
//! [`aggregate`] walks the archive's category groups in order and, for each
//! file, decodes the payload, filters it with the category's policy and
//! converts the retained rows. Every step returns a typed result; a failure
//! is recorded in the [`ErrorLog`] under the file's category and processing
//! continues with the next file. Nothing raised for one file can affect
//! another file or another category.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use crate::{
    archive::{ArchiveEntry, CategoryFiles},
    error::FilterError,
    filter::filter_table,
    policy::{FilterPolicy, PolicyTable},
    table::{RowMap, Table},
    temporal::TargetDate,
};

/// Row count contributed by one successfully filtered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRowCount {
    /// Archive path of the file.
    pub file: String,
    /// Number of rows that matched the target date.
    pub row_count: usize,
}

/// Accumulated output for one category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryResult {
    /// Filtered rows: file processing order, then row order within each file.
    pub rows: Vec<RowMap>,
    /// Running total of filtered rows; always the sum of `files[..].row_count`.
    pub total_filtered_rows: usize,
    /// One entry per successfully filtered file, including files with zero matches.
    pub files: Vec<FileRowCount>,
}

impl CategoryResult {
    fn push_file(&mut self, file: &str, rows: Vec<RowMap>) {
        let row_count = rows.len();
        self.total_filtered_rows += row_count;
        self.files.push(FileRowCount {
            file: file.to_string(),
            row_count,
        });
        self.rows.extend(rows);
    }
}

/// One recorded file failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    /// Archive path of the file.
    pub file: String,
    /// Human-readable failure message.
    pub error: String,
}

/// File failures grouped by category.
///
/// A category is present if and only if at least one of its files failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorLog(BTreeMap<String, Vec<FileFailure>>);

impl ErrorLog {
    /// An empty log.
    pub fn new() -> Self {
        ErrorLog::default()
    }

    /// Record a failure of `file` in `category`.
    pub fn record(&mut self, category: &str, file: &str, error: impl ToString) {
        self.0
            .entry(category.to_string())
            .or_default()
            .push(FileFailure {
                file: file.to_string(),
                error: error.to_string(),
            });
    }

    /// Whether no failure was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of recorded failures across all categories.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Failures recorded for `category`, if any.
    pub fn get(&self, category: &str) -> Option<&[FileFailure]> {
        self.0.get(category).map(Vec::as_slice)
    }

    /// Iterate categories and their failures in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FileFailure])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Everything produced by one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct AggregateReport {
    /// Categories with at least one filtered row, by name.
    pub categories: BTreeMap<String, CategoryResult>,
    /// Per-file failures.
    pub errors: ErrorLog,
    /// Number of payloads processed.
    pub files_seen: usize,
    /// Number of payloads that failed.
    pub files_failed: usize,
}

/// Decode, filter and convert one payload.
fn process_file(
    entry: &ArchiveEntry,
    target: TargetDate,
    policy: &FilterPolicy,
) -> Result<Vec<RowMap>, FilterError> {
    let table = Table::from_parquet(entry.payload.clone())?;
    let filtered = filter_table(&table, target, policy)?;
    filtered.to_row_maps()
}

/// Filter every file of every category for `target`.
///
/// Categories whose files produced no rows at all are left out of
/// [`AggregateReport::categories`]. Failures never abort the pass.
pub fn aggregate(
    groups: &[CategoryFiles],
    target: TargetDate,
    policies: &PolicyTable,
) -> AggregateReport {
    let mut report = AggregateReport::default();

    for group in groups {
        let policy = policies.policy_for(&group.category);
        let mut result = CategoryResult::default();

        for entry in &group.files {
            report.files_seen += 1;
            match process_file(entry, target, policy) {
                Ok(rows) => {
                    debug!("{}: {} rows on {target}", entry.file_id, rows.len());
                    result.push_file(&entry.file_id, rows);
                }
                Err(e) => {
                    warn!("{}: {e}", entry.file_id);
                    report.files_failed += 1;
                    report.errors.record(&group.category, &entry.file_id, &e);
                }
            }
        }

        if result.total_filtered_rows > 0 {
            report.categories.insert(group.category.clone(), result);
        }
    }

    report
}
