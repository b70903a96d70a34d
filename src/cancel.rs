//! Cooperative cancellation of retry backoff waits.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// A shareable token that interrupts a call while it waits to retry.
///
/// Cancelling does not abort an HTTP attempt that is already in flight; the
/// call ends with an [`INTERRUPTED`](crate::codes::INTERRUPTED) error at the
/// next backoff wait.
///
/// ```
/// use mailbreeze::CancelToken;
/// use std::time::Duration;
///
/// let token = CancelToken::new();
/// let waiter = token.clone();
/// std::thread::spawn(move || token.cancel());
/// // Returns early once the other thread cancels.
/// waiter.wait_timeout(Duration::from_secs(60));
/// assert!(waiter.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
    notify: Notify,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token, waking every blocked or pending waiter.
    pub fn cancel(&self) {
        let mut cancelled = match self.inner.cancelled.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *cancelled = true;
        drop(cancelled);
        self.inner.condvar.notify_all();
        self.inner.notify.notify_waiters();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        match self.inner.cancelled.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Blocks the current thread for `timeout` or until cancelled.
    ///
    /// Returns `true` if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = match self.inner.cancelled.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = self
            .inner
            .condvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled);
        match result {
            Ok((guard, _)) => *guard,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }

    /// Sleeps on the tokio timer for `duration` or until cancelled, without
    /// holding a worker thread.
    ///
    /// Returns `true` if the token was cancelled.
    pub async fn sleep_or_cancelled(&self, duration: Duration) -> bool {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return true;
        }

        tokio::select! {
            _ = &mut notified => true,
            _ = tokio::time::sleep(duration) => self.is_cancelled(),
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
