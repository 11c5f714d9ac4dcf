//! Rendering of the per-category and error documents.
//!
//! Rendering is separate from writing: [`render`] produces every document in
//! memory, and [`write_documents`] then commits each one with an atomic
//! write. A serialization failure therefore never leaves a truncated file
//! behind.
//!
//! Category document layout:
//!
//! ```json
//! {
//!     "data": [ { "<column>": <value>, ... }, ... ],
//!     "controls": {
//!         "total_filtered_rows": 2,
//!         "edited_date": "2024-03-10",
//!         "files": [ { "file": "assets/0.parquet", "row_count": 2 } ]
//!     }
//! }
//! ```
//!
//! Error document layout: `{ "errors": { "<category>": [ { "file", "error" } ] } }`.

use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use snafu::prelude::*;

use crate::{
    aggregate::{AggregateReport, CategoryResult, ErrorLog, FileRowCount},
    error::{EmitError, PipelineResult, SerializeSnafu, StorageSnafu},
    storage::write_atomic,
    table::RowMap,
    temporal::TargetDate,
};

/// Default file name of the consolidated error document.
pub const ERROR_DOCUMENT_NAME: &str = "error.json";

const INDENT: &[u8] = b"    ";

#[derive(Serialize)]
struct CategoryDocument<'a> {
    data: &'a [RowMap],
    controls: Controls<'a>,
}

#[derive(Serialize)]
struct Controls<'a> {
    total_filtered_rows: usize,
    edited_date: TargetDate,
    files: &'a [FileRowCount],
}

#[derive(Serialize)]
struct ErrorDocument<'a> {
    errors: &'a ErrorLog,
}

/// A fully rendered document ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name of the document (no directory component).
    pub name: String,
    /// UTF-8 JSON contents.
    pub contents: Vec<u8>,
}

/// All documents produced by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Emission {
    /// One document per category with at least one filtered row, in category name order.
    pub categories: Vec<Document>,
    /// The consolidated error document, present only when a file failed.
    pub errors: Option<Document>,
}

/// File name of the document for `category` on `date`: `<category>-<YYYY-MM-DD>.json`.
pub fn category_file_name(category: &str, date: TargetDate) -> String {
    format!("{category}-{date}.json")
}

/// Serialize `value` as JSON with 4-space indentation.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Render the document for one category.
pub fn render_category(
    category: &str,
    result: &CategoryResult,
    date: TargetDate,
) -> Result<Document, EmitError> {
    let name = category_file_name(category, date);
    let doc = CategoryDocument {
        data: &result.rows,
        controls: Controls {
            total_filtered_rows: result.total_filtered_rows,
            edited_date: date,
            files: &result.files,
        },
    };
    let contents = to_pretty_json(&doc).context(SerializeSnafu { name: name.as_str() })?;
    Ok(Document { name, contents })
}

/// Render the consolidated error document, or `None` when the log is empty.
pub fn render_errors(errors: &ErrorLog) -> Result<Option<Document>, EmitError> {
    if errors.is_empty() {
        return Ok(None);
    }

    let contents = to_pretty_json(&ErrorDocument { errors }).context(SerializeSnafu {
        name: ERROR_DOCUMENT_NAME,
    })?;
    Ok(Some(Document {
        name: ERROR_DOCUMENT_NAME.to_string(),
        contents,
    }))
}

/// Render every document for an aggregation report.
pub fn render(report: &AggregateReport, date: TargetDate) -> Result<Emission, EmitError> {
    let categories = report
        .categories
        .iter()
        .filter(|(_, r)| !r.rows.is_empty())
        .map(|(category, result)| render_category(category, result, date))
        .collect::<Result<Vec<_>, _>>()?;

    let errors = render_errors(&report.errors)?;
    Ok(Emission { categories, errors })
}

/// Paths written by [`write_documents`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Written {
    /// Category documents, in write order.
    pub categories: Vec<PathBuf>,
    /// The error document, when one was written.
    pub errors: Option<PathBuf>,
}

/// Write category documents into `output_dir` and the error document to `error_log_path`.
///
/// Each write is atomic. The first failure stops the remaining writes.
pub async fn write_documents(
    emission: &Emission,
    output_dir: &Path,
    error_log_path: &Path,
) -> PipelineResult<Written> {
    let mut written = Written::default();

    for doc in &emission.categories {
        let path = output_dir.join(&doc.name);
        write_atomic(&path, &doc.contents)
            .await
            .context(StorageSnafu {
                path: path.display().to_string(),
            })?;
        info!("wrote {} ({} bytes)", path.display(), doc.contents.len());
        written.categories.push(path);
    }

    if let Some(doc) = &emission.errors {
        let path = error_log_path.to_path_buf();
        write_atomic(&path, &doc.contents)
            .await
            .context(StorageSnafu {
                path: path.display().to_string(),
            })?;
        info!("wrote error log {}", path.display());
        written.errors = Some(path);
    }

    Ok(written)
}
