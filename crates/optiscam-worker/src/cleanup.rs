//! Scoped cleanup of a job's staged media.
//!
//! Every artifact a job creates lives directly under the work directory with
//! the job id as name prefix: the staged video (`<id>.<ext>` or
//! `<id>_<upload name>`), partial downloads, and the frame directory
//! (`<id>_frames/`). One prefix sweep therefore removes all of them.

use std::path::{Path, PathBuf};

use optiscam_media::sweep_prefix;
use optiscam_models::JobId;
use tracing::{debug, warn};

/// Name of the per-job frame directory.
pub fn frames_dir_name(job_id: &JobId) -> String {
    format!("{}_frames", job_id)
}

/// RAII guard that sweeps a job's artifacts.
///
/// Call [`ArtifactGuard::cleanup`] on the normal path. If the guard is
/// dropped without it (panic, task abort), `Drop` sweeps synchronously.
pub struct ArtifactGuard {
    work_dir: PathBuf,
    prefix: String,
    done: bool,
}

impl ArtifactGuard {
    pub fn new(work_dir: impl Into<PathBuf>, job_id: &JobId) -> Self {
        Self {
            work_dir: work_dir.into(),
            prefix: job_id.to_string(),
            done: false,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Staged video path for an upload named `filename`.
    pub fn upload_path(&self, filename: &str) -> PathBuf {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload.mp4".to_string());
        self.work_dir.join(format!("{}_{}", self.prefix, name))
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.work_dir.join(format!("{}_frames", self.prefix))
    }

    /// Remove every artifact for this job. Returns the number of entries
    /// removed. Safe to repeat; later calls catch anything written since.
    pub async fn cleanup(&mut self) -> usize {
        self.done = true;

        match sweep_prefix(&self.work_dir, &self.prefix).await {
            Ok(removed) => {
                debug!(prefix = %self.prefix, removed, "Job artifacts cleaned up");
                removed
            }
            Err(e) => {
                warn!(prefix = %self.prefix, "Failed to clean up job artifacts: {}", e);
                0
            }
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        warn!(prefix = %self.prefix, "ArtifactGuard dropped without cleanup(), sweeping synchronously");
        sweep_prefix_blocking(&self.work_dir, &self.prefix);
    }
}

fn sweep_prefix_blocking(dir: &Path, prefix: &str) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        let path = entry.path();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        if let Err(e) = result {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
