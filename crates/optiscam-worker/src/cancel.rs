//! Cooperative cancellation for job tasks.

use optiscam_media::{cancelled, never_cancelled, CancelSignal};
use tokio::sync::watch;

use crate::error::{WorkerError, WorkerResult};

/// Sender half, held by the job manager.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

/// Receiver half, checked by the job task between stages.
#[derive(Debug, Clone)]
pub struct CancelToken(CancelSignal);

/// Create a linked handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

impl CancelToken {
    /// Token that is never cancelled.
    pub fn never() -> Self {
        Self(never_cancelled())
    }

    /// Signal for media operations that stop mid-stage.
    pub fn signal(&self) -> CancelSignal {
        self.0.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the
    /// handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut signal = self.0.clone();
        cancelled(&mut signal).await;
    }

    /// Stage-boundary check.
    pub fn check(&self) -> WorkerResult<()> {
        if self.is_cancelled() {
            Err(WorkerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
