//! Local filesystem writes for output documents.
//!
//! Documents are committed with write-then-rename so readers never observe a
//! partially written file: the payload goes to a temporary sibling, is synced,
//! and is then renamed over the destination. The temporary file is removed if
//! any step fails.

use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tokio::{fs, io::AsyncWriteExt};

use crate::error::{OtherIoSnafu, StorageResult};

/// Create `dir` and any missing parents.
pub async fn ensure_dir(dir: &Path) -> StorageResult<()> {
    fs::create_dir_all(dir).await.context(OtherIoSnafu {
        path: dir.display().to_string(),
    })
}

async fn create_parent_dir(abs: &Path) -> StorageResult<()> {
    match abs.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent).await,
        _ => Ok(()),
    }
}

/// Guard that removes a temporary file on drop unless disarmed.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Keep the file; call after a successful rename.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort cleanup while another error is already propagating.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Temporary sibling used while writing `path`.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically write `contents` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`crate::error::StorageError::OtherIo`] naming the path of the
/// failing step (temporary file or destination).
pub async fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    create_parent_dir(path).await?;

    let tmp_path = temp_path_for(path);
    let mut guard = TempFileGuard::new(tmp_path.clone());

    {
        let mut file = fs::File::create(&tmp_path).await.context(OtherIoSnafu {
            path: tmp_path.display().to_string(),
        })?;

        file.write_all(contents).await.context(OtherIoSnafu {
            path: tmp_path.display().to_string(),
        })?;

        file.sync_all().await.context(OtherIoSnafu {
            path: tmp_path.display().to_string(),
        })?;
    }

    fs::rename(&tmp_path, path).await.context(OtherIoSnafu {
        path: path.display().to_string(),
    })?;

    guard.disarm();
    Ok(())
}
