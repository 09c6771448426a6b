//! Filesystem helpers for per-job artifact cleanup.

use std::path::Path;
use tokio::fs;

use crate::error::MediaResult;

/// Remove every file or directory in `dir` whose name starts with `prefix`.
///
/// Returns the number of entries removed. A missing `dir` counts as clean.
/// Individual removal failures are logged and skipped so one stuck file does
/// not keep the rest around.
pub async fn sweep_prefix(dir: impl AsRef<Path>, prefix: &str) -> MediaResult<usize> {
    let dir = dir.as_ref();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(prefix) {
            continue;
        }

        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };

        match result {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        tracing::debug!(dir = %dir.display(), prefix, removed, "Swept job artifacts");
    }
    Ok(removed)
}
