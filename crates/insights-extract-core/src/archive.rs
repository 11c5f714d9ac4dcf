//! Snapshot archive decomposition.
//!
//! The snapshot is a zip container whose Parquet entries are grouped by their
//! first path segment (`assets/part-0.parquet` belongs to `assets`). Entries
//! that are not Parquet files are skipped. Entries at the archive root have no
//! category segment and are grouped under [`ROOT_CATEGORY`]. An archive that
//! also has a real `_root/` folder gets both sets of files in that one
//! category; each root-level entry is logged with a warning when it is added.
//!
//! Categories and the files inside each category keep the order in which
//! they first appear in the archive.

use std::{
    collections::HashMap,
    io::{Cursor, Read},
};

use bytes::Bytes;
use log::{debug, info, warn};
use snafu::prelude::*;
use zip::ZipArchive;

use crate::error::{ArchiveResult, EntrySnafu, OpenSnafu, ReadEntrySnafu};

/// Category assigned to Parquet entries stored at the archive root.
///
/// Shared with a literal `_root/` folder, if the archive has one.
pub const ROOT_CATEGORY: &str = "_root";

/// File-name suffix identifying a tabular payload.
pub const PAYLOAD_SUFFIX: &str = ".parquet";

/// One payload extracted from the archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Full entry path inside the archive; used as the file identifier in reports.
    pub file_id: String,
    /// Raw payload bytes.
    pub payload: Bytes,
}

/// All payloads that share a category, in archive order.
#[derive(Debug, Clone)]
pub struct CategoryFiles {
    /// Category name (first path segment of each entry).
    pub category: String,
    /// Payloads of this category.
    pub files: Vec<ArchiveEntry>,
}

/// Category of an archive entry path.
///
/// Returns `None` for entries with no directory component (or an empty one,
/// as in `/file.parquet`); callers map those to [`ROOT_CATEGORY`].
pub fn category_of(path: &str) -> Option<&str> {
    match path.split_once('/') {
        Some((first, _)) if !first.is_empty() => Some(first),
        _ => None,
    }
}

fn is_payload(name: &str) -> bool {
    name.ends_with(PAYLOAD_SUFFIX)
}

/// Open the archive and group its Parquet payloads by category.
///
/// # Errors
///
/// Fails when the bytes are not a readable zip archive or when an entry
/// cannot be decompressed. Either condition is fatal to the run.
pub fn open(archive: &[u8]) -> ArchiveResult<Vec<CategoryFiles>> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).context(OpenSnafu)?;

    let mut groups: Vec<CategoryFiles> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0usize;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).context(EntrySnafu { index: i })?;
        let name = entry.name().to_string();

        if entry.is_dir() || !is_payload(&name) {
            debug!("skipping non-payload archive entry {name}");
            skipped += 1;
            continue;
        }

        let category = match category_of(&name) {
            Some(c) => c.to_string(),
            None => {
                warn!("archive entry {name} has no category directory; grouping under {ROOT_CATEGORY}");
                ROOT_CATEGORY.to_string()
            }
        };

        let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut buf)
            .context(ReadEntrySnafu { name: name.as_str() })?;

        let slot = *index.entry(category.clone()).or_insert_with(|| {
            groups.push(CategoryFiles {
                category,
                files: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].files.push(ArchiveEntry {
            file_id: name,
            payload: Bytes::from(buf),
        });
    }

    let payloads: usize = groups.iter().map(|g| g.files.len()).sum();
    info!(
        "archive scanned: {payloads} payloads in {} categories ({skipped} entries skipped)",
        groups.len()
    );

    Ok(groups)
}
