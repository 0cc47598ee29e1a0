//! Cancellation handles for session tasks.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable signal telling a background task to stop.
///
/// All clones share one flag. Once cancelled a handle stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Create a new, uncancelled handle.
    #[must_use]
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    /// Signal every holder of this handle to stop.
    pub fn cancel(&self) {
        self.signal.send_replace(true);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.signal.borrow()
    }

    /// Wait until the handle is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}
