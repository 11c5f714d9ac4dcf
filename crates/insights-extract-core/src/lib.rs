//! Daily extraction of one day's rows from an insights snapshot archive.
//!
//! The crate turns a zip archive of Parquet snapshots into per-category JSON
//! documents holding only the rows whose timestamp falls on a target date:
//!
//! - `archive` splits the archive into per-category file groups.
//! - `policy` maps a category to its timestamp column and missing-column rule.
//! - `table` and `filter` decode one payload and keep the target date's rows.
//! - `aggregate` accumulates rows and row counts per category, isolating
//!   per-file failures into an error log.
//! - `emit` and `storage` render and atomically write the documents.
//! - `pipeline` ties one run together from a [`RunConfig`].
//!
//! Retrieval of the archive and process setup live in the CLI crate.
#![deny(missing_docs)]
pub mod aggregate;
pub mod archive;
pub mod emit;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod policy;
pub mod storage;
pub mod table;
pub mod temporal;

#[cfg(test)]
pub(crate) mod test_util;

pub use aggregate::{AggregateReport, CategoryResult, ErrorLog, FileFailure, FileRowCount};
pub use error::{ArchiveError, EmitError, FilterError, PipelineError, StorageError};
pub use filter::{FilterOutcome, filter_table};
pub use pipeline::{RunConfig, RunSummary, extract, run};
pub use policy::{FilterPolicy, MissingColumn, PolicyOverride, PolicyTable};
pub use table::{RowMap, Table};
pub use temporal::{ParseTargetDateError, TargetDate};
