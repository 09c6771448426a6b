//! Cancellation signal accepted by long-running media operations.

use tokio::sync::watch;

/// Flips to `true` once the owner asks the operation to stop.
pub type CancelSignal = watch::Receiver<bool>;

/// Signal that never fires.
pub fn never_cancelled() -> CancelSignal {
    let (_tx, rx) = watch::channel(false);
    rx
}

/// Resolves once cancellation is requested. Pends forever if the sender
/// was dropped without cancelling.
pub async fn cancelled(signal: &mut CancelSignal) {
    if signal.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub fn is_cancelled(signal: &CancelSignal) -> bool {
    *signal.borrow()
}
