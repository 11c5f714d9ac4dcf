//! Error types and SNAFU context selectors for the extraction pipeline.
//!
//! Errors fall into two groups:
//! - Fatal run errors ([`ArchiveError`], [`StorageError`], [`EmitError`],
//!   wrapped by [`PipelineError`]) abort the run and propagate to the caller.
//! - File-level errors ([`FilterError`]) are recoverable. The aggregator
//!   records them in the error log under the owning category and moves on to
//!   the next file; they never escape the aggregation step.

use std::io;

use arrow::{datatypes::DataType, error::ArrowError};
use parquet::errors::ParquetError;
use snafu::{Backtrace, prelude::*};
use zip::result::ZipError;

/// Errors raised while opening or scanning the snapshot archive.
///
/// Any of these aborts the whole run: a partially readable archive would make
/// the per-category row counts meaningless.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ArchiveError {
    /// The archive bytes are not a readable zip container.
    #[snafu(display("Failed to open snapshot archive: {source}"))]
    Open {
        /// Underlying zip error.
        source: ZipError,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// An entry could not be located by index in the central directory.
    #[snafu(display("Failed to access archive entry #{index}: {source}"))]
    Entry {
        /// Position of the entry in the archive.
        index: usize,
        /// Underlying zip error.
        source: ZipError,
    },

    /// An entry was found but its contents could not be decompressed.
    #[snafu(display("Failed to read archive entry {name}: {source}"))]
    ReadEntry {
        /// Full path of the entry inside the archive.
        name: String,
        /// Underlying I/O error from the decompressor.
        source: io::Error,
    },
}

/// Per-file failures recorded in the error log.
///
/// The `Display` output of each variant is the message persisted in the
/// consolidated error document, so keep it short and user-facing.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FilterError {
    /// The payload is not a readable Parquet file.
    #[snafu(display("Parquet read error: {source}"))]
    ParquetRead {
        /// Underlying Parquet error.
        source: ParquetError,
    },

    /// The payload decoded, but Arrow failed while materializing batches.
    #[snafu(display("Arrow error while reading payload: {source}"))]
    ArrowRead {
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// The category's timestamp column is absent and the policy makes that fatal.
    #[snafu(display("Missing '{column}' column"))]
    MissingColumn {
        /// Name of the timestamp column the policy requires.
        column: String,
    },

    /// The timestamp column has a type that cannot be read as a date.
    #[snafu(display("Unsupported type for timestamp column '{column}': {datatype}"))]
    UnsupportedColumnType {
        /// Name of the timestamp column.
        column: String,
        /// The Arrow type found in the payload.
        datatype: DataType,
    },

    /// The timestamp column carries a timezone annotation that cannot be resolved.
    #[snafu(display("Invalid timezone '{timezone}' on column '{column}': {source}"))]
    InvalidTimezone {
        /// Name of the timestamp column.
        column: String,
        /// The timezone string stored in the schema.
        timezone: String,
        /// Underlying Arrow parse error.
        source: ArrowError,
    },

    /// Arrow compute failed while casting or filtering the table.
    #[snafu(display("Arrow error while filtering '{column}': {source}"))]
    Filter {
        /// Name of the timestamp column being filtered.
        column: String,
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// A column could not be prepared for JSON encoding.
    #[snafu(display("Failed to convert column '{column}' to JSON values: {source}"))]
    RowConversion {
        /// Column whose values could not be rendered.
        column: String,
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// Arrow's JSON writer rejected the filtered rows.
    #[snafu(display("Failed to encode rows as JSON: {source}"))]
    RowEncode {
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// The JSON produced for the filtered rows is not an array of objects.
    #[snafu(display("Failed to decode encoded rows: {source}"))]
    RowDecode {
        /// Underlying serde_json error.
        source: serde_json::Error,
    },
}

/// Errors produced while writing output documents to local storage.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// An I/O error occurred on the local filesystem.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// The path where the I/O error occurred.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },
}

/// Errors produced while rendering output documents.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EmitError {
    /// A document could not be serialized to JSON.
    #[snafu(display("Failed to serialize document {name}: {source}"))]
    Serialize {
        /// Name of the document being rendered.
        name: String,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },
}

/// Fatal errors for a whole pipeline run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    /// The archive could not be opened or scanned.
    #[snafu(display("Archive error: {source}"))]
    Archive {
        /// Underlying archive error.
        #[snafu(source, backtrace)]
        source: ArchiveError,
    },

    /// Output documents could not be rendered.
    #[snafu(display("Emit error: {source}"))]
    Emit {
        /// Underlying emit error.
        source: EmitError,
    },

    /// Output documents could not be written.
    #[snafu(display("Storage error while writing {path}: {source}"))]
    Storage {
        /// Destination path of the failed write.
        path: String,
        /// Underlying storage error.
        #[snafu(source, backtrace)]
        source: StorageError,
    },
}

/// Result alias for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result alias for a pipeline run.
pub type PipelineResult<T> = Result<T, PipelineError>;
