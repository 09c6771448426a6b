//! Process-group ownership for tools that spawn helpers of their own.
//!
//! yt-dlp hands merging to an ffmpeg child. Killing only the yt-dlp pid
//! leaves that child writing into the staging directory, so the whole group
//! is signalled instead.

use tokio::process::{Child, Command};
use tracing::debug;

/// Put the command's child in a fresh process group led by itself.
pub fn isolate_group(cmd: &mut Command) {
    #[cfg(unix)]
    cmd.process_group(0);
    #[cfg(not(unix))]
    let _ = cmd;
}

/// Kills every process in a child's group when dropped, unless released.
#[derive(Debug)]
pub struct GroupKillGuard {
    pgid: Option<i32>,
}

impl GroupKillGuard {
    /// Guard the group led by `child`. The child must have been spawned
    /// through a command passed to [`isolate_group`].
    pub fn new(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    /// Signal the group now. Later calls and the drop are no-ops.
    pub fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }

    /// The group exited on its own; nothing to kill.
    pub fn release(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKillGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: i32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // ESRCH means the group is already gone
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!(pgid, error = %e, "Process group kill skipped");
    }
}

#[cfg(not(unix))]
fn kill_group(pgid: i32) {
    debug!(pgid, "Process groups unsupported on this platform");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_kills_grandchildren() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("late.txt");

        // The shell's background child stands in for a helper process
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("(sleep 1; touch {}) & wait", marker.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        isolate_group(&mut cmd);
        let mut child = cmd.spawn().unwrap();

        let mut guard = GroupKillGuard::new(&child);
        guard.kill();
        child.wait().await.unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }
}
