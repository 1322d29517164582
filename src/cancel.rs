//! Cooperative cancellation for detection runs.
//!
//! A [`CancellationToken`] is cloned into every in-flight fetch. Backoff waits
//! and rate-limit waits race against [`CancellationToken::cancelled`], so
//! cancelling the token aborts pending work without touching results that
//! were already produced.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Cloneable cancellation signal.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Creates a token that cancels itself once `timeout` elapses.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let token = Self::new();
        let deadline = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            debug!("Deadline of {}s reached, cancelling", timeout.as_secs_f64());
            deadline.cancel();
        });
        token
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves when cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
