//! Run-wide cancellation signal.
//!
//! One [`CancelToken`] spans a whole archive run. Clones share the same
//! state, so the Ctrl-C listener in the binary and every pipeline stage can
//! hold their own handle. Waiting is async, which lets in-flight requests and
//! subprocesses be raced against it with `tokio::select!`.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable, awaitable cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Cancels the run. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Completes when the token is cancelled. Returns immediately if it
    /// already is.
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}
