//! Cooperative cancellation token with callback fan-out.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Raised when an operation observes a tripped cancellation token.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation was cancelled")]
pub struct Cancelled;

type CancelCallback = Box<dyn Fn() + Send>;

struct TokenState {
    cancelled: bool,
    callbacks: Vec<CancelCallback>,
}

struct TokenInner {
    state: Mutex<TokenState>,
    condvar: Condvar,
}

/// Cooperative cancellation handle shared between a submitter and a task.
///
/// Cloning produces another handle to the same token. Cancellation is
/// idempotent: only the first `cancel` transitions the flag and fires
/// registered callbacks. Long-running work is expected to call `check`
/// (or test `is_cancelled`) at its suspension points.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                state: Mutex::new(TokenState {
                    cancelled: false,
                    callbacks: Vec::new(),
                }),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cancelled
    }

    /// Request cancellation and fire registered callbacks.
    ///
    /// Callbacks run on the cancelling thread, outside the token lock.
    /// A panicking callback is logged and does not abort the others.
    pub fn cancel(&self) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.callbacks)
        };
        self.inner.condvar.notify_all();

        for callback in &callbacks {
            run_callback(callback);
        }
    }

    /// Register a callback to be invoked on cancellation.
    ///
    /// If the token is already cancelled the callback fires synchronously
    /// before this method returns; the cancelled check and registration
    /// are atomic, so the callback fires exactly once either way.
    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + 'static,
    {
        let callback: CancelCallback = Box::new(callback);
        let fire_now = {
            let mut state = self.inner.state.lock();
            if state.cancelled {
                true
            } else {
                state.callbacks.push(callback);
                return;
            }
        };
        debug_assert!(fire_now);
        run_callback(&callback);
    }

    /// Block until cancellation or timeout.
    ///
    /// Returns true if the token was cancelled, false on timeout.
    /// With no timeout this waits indefinitely.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut state = self.inner.state.lock();
        match timeout {
            Some(duration) => {
                if state.cancelled {
                    return true;
                }
                self.inner
                    .condvar
                    .wait_while_for(&mut state, |s| !s.cancelled, duration);
                state.cancelled
            }
            None => {
                while !state.cancelled {
                    self.inner.condvar.wait(&mut state);
                }
                true
            }
        }
    }

    /// Return `Err(Cancelled)` if cancellation has been requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Reset the token for reuse, clearing the flag and any callbacks.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        state.cancelled = false;
        state.callbacks.clear();
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

fn run_callback(callback: &CancelCallback) {
    if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
        tracing::warn!("Cancellation callback panicked");
    }
}
