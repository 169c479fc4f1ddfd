//! Graceful shutdown handling for long-running operations.
//!
//! A [`ShutdownManager`] is an explicit process-lifecycle value: the
//! process owner constructs one at startup and injects it wherever
//! shutdown awareness is needed; tests construct their own for
//! isolation.
//!
//! Signal policy: the installed interrupt/terminate handler only sets
//! the shutdown latch. Cleanup (registered handlers in reverse order,
//! then tracked temp paths) runs exactly once, from [`ShutdownManager::
//! run_cleanup`], which the process owner invokes on its way out.
//! Running cleanup inside the signal handler would risk re-entrancy
//! deadlocks with locks held by the interrupted thread and double
//! execution when the exit path also runs it.

mod arena;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, ReentrantMutex};
use thiserror::Error;

pub use arena::TempArena;

/// Raised when an operation observes a requested shutdown.
///
/// Semantically equivalent to cancellation for the engine, but causes
/// job state to be marked `interrupted` rather than `failed`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("shutdown requested")]
pub struct Interrupted;

/// Handle identifying a registered cleanup handler, for unregistration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupHandle(u64);

type CleanupFn = Box<dyn Fn() + Send>;

struct ShutdownInner {
    requested: Mutex<bool>,
    condvar: Condvar,
    // Re-entrant: a cleanup handler may (un)register handlers or temp
    // paths while the handler list lock is held on this thread.
    handlers: ReentrantMutex<RefCell<Vec<(u64, CleanupFn)>>>,
    next_handle: AtomicU64,
    temp_paths: Mutex<BTreeSet<PathBuf>>,
    signals_installed: AtomicBool,
    cleanup_once: Once,
}

/// Process-wide shutdown coordination.
///
/// Cloning produces another handle to the same state.
#[derive(Clone)]
pub struct ShutdownManager {
    inner: Arc<ShutdownInner>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownInner {
                requested: Mutex::new(false),
                condvar: Condvar::new(),
                handlers: ReentrantMutex::new(RefCell::new(Vec::new())),
                next_handle: AtomicU64::new(1),
                temp_paths: Mutex::new(BTreeSet::new()),
                signals_installed: AtomicBool::new(false),
                cleanup_once: Once::new(),
            }),
        }
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        *self.inner.requested.lock()
    }

    /// Request a graceful shutdown.
    pub fn request_shutdown(&self) {
        *self.inner.requested.lock() = true;
        self.inner.condvar.notify_all();
    }

    /// Reset the shutdown latch (for testing).
    pub fn reset_shutdown(&self) {
        *self.inner.requested.lock() = false;
    }

    /// Block until shutdown is requested or the timeout elapses.
    ///
    /// Returns true if shutdown was requested.
    pub fn wait_for_shutdown(&self, timeout: Option<Duration>) -> bool {
        let mut requested = self.inner.requested.lock();
        match timeout {
            Some(duration) => {
                if *requested {
                    return true;
                }
                self.inner
                    .condvar
                    .wait_while_for(&mut requested, |r| !*r, duration);
                *requested
            }
            None => {
                while !*requested {
                    self.inner.condvar.wait(&mut requested);
                }
                true
            }
        }
    }

    /// Return `Err(Interrupted)` if shutdown has been requested.
    pub fn check_shutdown(&self) -> Result<(), Interrupted> {
        if self.is_shutdown_requested() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Register a cleanup handler to run on shutdown.
    ///
    /// Handlers run in reverse registration order (last registered,
    /// first run). The returned handle unregisters it.
    pub fn register_cleanup_handler<F>(&self, handler: F) -> CleanupHandle
    where
        F: Fn() + Send + 'static,
    {
        let id = self.inner.next_handle.fetch_add(1, Ordering::SeqCst);
        let guard = self.inner.handlers.lock();
        guard.borrow_mut().push((id, Box::new(handler)));
        CleanupHandle(id)
    }

    /// Unregister a previously registered cleanup handler.
    pub fn unregister_cleanup_handler(&self, handle: CleanupHandle) {
        let guard = self.inner.handlers.lock();
        guard.borrow_mut().retain(|(id, _)| *id != handle.0);
    }

    /// Register a temporary path (file or directory) for deletion on
    /// cleanup.
    pub fn register_temp_file(&self, path: impl Into<PathBuf>) {
        self.inner.temp_paths.lock().insert(path.into());
    }

    /// Unregister a temporary path (e.g. after successful processing,
    /// so the artifact survives exit).
    pub fn unregister_temp_file(&self, path: &Path) {
        self.inner.temp_paths.lock().remove(path);
    }

    /// Snapshot of the tracked temp paths.
    pub fn tracked_temp_files(&self) -> Vec<PathBuf> {
        self.inner.temp_paths.lock().iter().cloned().collect()
    }

    /// Install interrupt and terminate handlers.
    ///
    /// Must be called from the main thread, once, before spawning
    /// workers. The handler only latches the shutdown flag; cleanup
    /// stays with [`run_cleanup`](Self::run_cleanup). Safe to call
    /// repeatedly; only the first call installs.
    pub fn install_signal_handlers(&self) -> Result<(), ctrlc::Error> {
        if self.inner.signals_installed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let manager = self.clone();
        ctrlc::set_handler(move || {
            tracing::info!("Received shutdown signal, initiating graceful shutdown...");
            manager.request_shutdown();
        })?;
        tracing::debug!("Signal handlers installed for graceful shutdown");
        Ok(())
    }

    /// Run cleanup exactly once: handlers in reverse registration
    /// order (panics isolated per handler), then tracked temp paths.
    ///
    /// Subsequent calls are no-ops, so it is safe for both the normal
    /// exit path and a shutdown-triggered path to call it.
    pub fn run_cleanup(&self) {
        let inner = self.inner.clone();
        inner.cleanup_once.call_once(|| {
            self.run_cleanup_handlers();
            self.cleanup_temp_files();
        });
    }

    fn run_cleanup_handlers(&self) {
        // Drain the list first so a handler that re-enters the manager
        // (to unregister itself, say) does not collide with iteration.
        let handlers = {
            let guard = self.inner.handlers.lock();
            let drained = std::mem::take(&mut *guard.borrow_mut());
            drained
        };
        for (id, handler) in handlers.iter().rev() {
            if catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                tracing::warn!("Cleanup handler {} panicked", id);
            }
        }
    }

    fn cleanup_temp_files(&self) {
        let paths: Vec<PathBuf> = {
            let mut tracked = self.inner.temp_paths.lock();
            let paths = tracked.iter().cloned().collect();
            tracked.clear();
            paths
        };

        for path in paths {
            if !path.exists() {
                continue;
            }
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => tracing::debug!("Cleaned up temp path: {}", path.display()),
                Err(e) => tracing::warn!("Failed to clean up {}: {}", path.display(), e),
            }
        }
    }

    /// Guard scope for operations that should observe shutdown
    /// gracefully. Logs when the scope ends with shutdown pending.
    pub fn graceful_operation(&self, label: impl Into<String>) -> GracefulOperation {
        let label = label.into();
        tracing::debug!("Starting {}", label);
        GracefulOperation {
            manager: self.clone(),
            label,
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Scope guard returned by [`ShutdownManager::graceful_operation`].
pub struct GracefulOperation {
    manager: ShutdownManager,
    label: String,
}

impl GracefulOperation {
    /// Check for shutdown from inside the scope.
    pub fn check(&self) -> Result<(), Interrupted> {
        self.manager.check_shutdown()
    }
}

impl Drop for GracefulOperation {
    fn drop(&mut self) {
        if self.manager.is_shutdown_requested() {
            tracing::info!("Shutdown requested during {}", self.label);
        }
    }
}
