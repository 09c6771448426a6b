//! Remote video fetching using yt-dlp.
//!
//! Fetched files are named after the job id (`<job_id>.<ext>`) inside the
//! staging directory so a prefix sweep removes partial downloads too.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::cancel::{cancelled, CancelSignal};
use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};
use crate::process::{isolate_group, GroupKillGuard};

/// Fetches a remote video into a local staging directory.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Download `url` to a file whose name starts with `file_stem`.
    ///
    /// Returns the path of the finished file. On error, partial files may
    /// remain; callers sweep them by prefix. Once `cancel` fires the fetch
    /// returns [`MediaError::Cancelled`], and nothing it started writes
    /// under the prefix afterwards.
    async fn fetch(
        &self,
        url: &str,
        staging_dir: &Path,
        file_stem: &str,
        cancel: CancelSignal,
    ) -> MediaResult<PathBuf>;
}

/// [`VideoFetcher`] backed by the yt-dlp CLI.
#[derive(Debug, Clone, Default)]
pub struct YtDlpFetcher {
    cookies_path: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

impl YtDlpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a Netscape cookies file when it looks valid.
    pub fn with_cookies(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    async fn usable_cookies(&self) -> Option<&Path> {
        let path = self.cookies_path.as_deref()?;
        match tokio::fs::read_to_string(path).await {
            Ok(content) if is_valid_netscape_cookies(&content) => Some(path),
            Ok(_) => {
                debug!("Cookies file {} is not in Netscape format, skipping", path.display());
                None
            }
            Err(e) => {
                warn!("Failed to read cookies file {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl VideoFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        url: &str,
        staging_dir: &Path,
        file_stem: &str,
        mut cancel: CancelSignal,
    ) -> MediaResult<PathBuf> {
        check_ytdlp()?;
        tokio::fs::create_dir_all(staging_dir).await?;

        let template = staging_dir.join(format!("{}.%(ext)s", file_stem));
        info!(url = %url, output = %template.display(), "Downloading video");

        let mut cmd = Command::new("yt-dlp");
        cmd.args([
            "--no-playlist",
            "--no-progress",
            "-f",
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
            "--merge-output-format",
            "mp4",
            "--print",
            "after_move:filepath",
            "-o",
        ])
        .arg(&template);
        if let Some(cookies) = self.usable_cookies().await {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        isolate_group(&mut cmd);

        let mut child = cmd.spawn()?;
        // Also covers the merge ffmpeg yt-dlp spawns, including when this
        // future is dropped
        let mut group = GroupKillGuard::new(&child);

        let stdout_task = child.stdout.take().map(|mut out| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = out.read_to_string(&mut buf).await;
                buf
            })
        });
        let stderr_task = child.stderr.take().map(|mut err| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = err.read_to_string(&mut buf).await;
                buf
            })
        });

        let deadline = async {
            match self.timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancelled(&mut cancel) => {
                info!(url = %url, "Download cancelled, killing yt-dlp process group");
                group.kill();
                let _ = child.wait().await;
                return Err(MediaError::Cancelled);
            }
            _ = deadline => {
                let secs = self.timeout_secs.unwrap_or_default();
                warn!(url = %url, "Download timed out after {} seconds", secs);
                group.kill();
                let _ = child.wait().await;
                return Err(MediaError::Timeout(secs));
            }
        };
        // yt-dlp reaps its own helpers before exiting
        group.release();

        let stdout = match stdout_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            debug!("yt-dlp stderr: {}", stderr);
            let error_msg = stderr.lines().last().unwrap_or("Unknown error");
            return Err(MediaError::download_failed(format!("yt-dlp failed: {}", error_msg)));
        }

        let path = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| MediaError::download_failed("yt-dlp did not report an output file"))?;

        if !path.exists() {
            return Err(MediaError::download_failed("Output file not created"));
        }

        let file_size = path.metadata()?.len();
        info!(
            output = %path.display(),
            size_mb = file_size as f64 / (1024.0 * 1024.0),
            "Downloaded video successfully"
        );
        Ok(path)
    }
}

/// Netscape cookies files start with a known header or hold tab-separated
/// entries of at least six fields.
fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File") || content.starts_with("# HTTP Cookie File") {
        return true;
    }
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .any(|l| l.split('\t').count() >= 6)
}
