//! Bounded worker pool for background jobs.
//!
//! N dedicated threads drain a FIFO channel of submitted tasks. Each
//! task gets a cancellation token (its own or a caller-supplied one)
//! passed explicitly to the task closure; cancellation is cooperative,
//! so a running task exits at its next token check while a queued task
//! is dropped before it starts.

use std::collections::HashMap;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use super::token::CancellationToken;

/// Identifier returned by [`WorkerPool::submit`].
pub type TaskId = String;

/// Status of a pool task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Outcome of a finished task.
#[derive(Debug)]
pub struct TaskResult<T, E> {
    pub status: TaskStatus,
    pub result: Option<T>,
    pub error: Option<E>,
    pub elapsed: Duration,
}

/// Errors from pool operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    Closed,
}

/// Boxed task body: receives the task's cancellation token.
pub type TaskFn<T, E> = Box<dyn FnOnce(&CancellationToken) -> Result<T, E> + Send>;
/// Boxed completion callback, fired on the worker thread.
pub type CompletionFn<T, E> = Box<dyn FnOnce(&TaskResult<T, E>) + Send>;

struct QueuedTask<T, E> {
    id: TaskId,
    func: TaskFn<T, E>,
    on_complete: Option<CompletionFn<T, E>>,
}

struct TaskEntry<T, E> {
    name: String,
    status: TaskStatus,
    token: CancellationToken,
    outcome: Option<Arc<TaskResult<T, E>>>,
}

struct PoolShared<T, E> {
    tasks: Mutex<HashMap<TaskId, TaskEntry<T, E>>>,
    completion: Condvar,
    closed: Mutex<bool>,
    counter: Mutex<u64>,
}

/// Managed thread pool for background operations.
///
/// Scheduling is FIFO with no priorities and no work stealing; fairness
/// comes from task size, not policy.
pub struct WorkerPool<T, E> {
    shared: Arc<PoolShared<T, E>>,
    sender: Mutex<Option<Sender<QueuedTask<T, E>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T, E> WorkerPool<T, E>
where
    T: Send + Sync + 'static,
    E: std::fmt::Display + Send + Sync + 'static,
{
    pub const DEFAULT_WORKERS: usize = 4;

    /// Create a pool with `max_workers` dedicated threads.
    ///
    /// Fails if a worker thread cannot be spawned (rare, usually
    /// resource exhaustion); any threads already started exit once the
    /// channel closes.
    pub fn new(max_workers: usize) -> io::Result<Self> {
        let workers = max_workers.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<QueuedTask<T, E>>();
        let shared = Arc::new(PoolShared {
            tasks: Mutex::new(HashMap::new()),
            completion: Condvar::new(),
            closed: Mutex::new(false),
            counter: Mutex::new(0),
        });

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let shared = shared.clone();
            let receiver = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("recap-worker-{}", i))
                .spawn(move || worker_loop(shared, receiver))?;
            handles.push(handle);
        }

        Ok(Self {
            shared,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
        })
    }

    /// Submit a task for execution.
    ///
    /// The task closure receives the cancellation token (caller-supplied
    /// via `token`, or a fresh one). `on_complete` fires on the worker
    /// thread after the task finishes, whatever the outcome.
    pub fn submit<F>(
        &self,
        func: F,
        name: impl Into<String>,
        id: Option<TaskId>,
        token: Option<CancellationToken>,
        on_complete: Option<CompletionFn<T, E>>,
    ) -> Result<TaskId, PoolError>
    where
        F: FnOnce(&CancellationToken) -> Result<T, E> + Send + 'static,
    {
        if *self.shared.closed.lock() {
            return Err(PoolError::Closed);
        }

        let id = id.unwrap_or_else(|| {
            let mut counter = self.shared.counter.lock();
            *counter += 1;
            format!("task-{}", counter)
        });

        let token = token.unwrap_or_default();
        let entry = TaskEntry {
            name: name.into(),
            status: TaskStatus::Pending,
            token: token.clone(),
            outcome: None,
        };
        self.shared.tasks.lock().insert(id.clone(), entry);

        let queued = QueuedTask {
            id: id.clone(),
            func: Box::new(func),
            on_complete,
        };

        let sent = {
            let sender = self.sender.lock();
            match sender.as_ref() {
                Some(s) => s.send(queued).is_ok(),
                None => false,
            }
        };
        if sent {
            Ok(id)
        } else {
            self.shared.tasks.lock().remove(&id);
            Err(PoolError::Closed)
        }
    }

    /// Cancel a running or pending task.
    ///
    /// Returns true if cancellation was initiated. A running task exits
    /// at its next token check; a pending task never starts.
    pub fn cancel(&self, id: &str) -> bool {
        let token = {
            let tasks = self.shared.tasks.lock();
            tasks.get(id).map(|entry| entry.token.clone())
        };
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel all tracked tasks. Returns the count cancelled.
    pub fn cancel_all(&self) -> usize {
        let tokens: Vec<CancellationToken> = {
            let tasks = self.shared.tasks.lock();
            tasks.values().map(|entry| entry.token.clone()).collect()
        };
        for token in &tokens {
            token.cancel();
        }
        tokens.len()
    }

    /// Current status of a task, if tracked.
    pub fn status(&self, id: &str) -> Option<TaskStatus> {
        self.shared.tasks.lock().get(id).map(|entry| entry.status)
    }

    /// Wait for a task to finish and return its outcome.
    ///
    /// Returns `None` if the task is unknown or the timeout elapsed
    /// before completion.
    pub fn result(&self, id: &str, timeout: Option<Duration>) -> Option<Arc<TaskResult<T, E>>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut tasks = self.shared.tasks.lock();
        loop {
            match tasks.get(id) {
                None => return None,
                Some(entry) => {
                    if let Some(outcome) = &entry.outcome {
                        return Some(outcome.clone());
                    }
                }
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .completion
                        .wait_until(&mut tasks, deadline)
                        .timed_out()
                    {
                        return None;
                    }
                }
                None => self.shared.completion.wait(&mut tasks),
            }
        }
    }

    /// Wait for every tracked task to finish.
    ///
    /// Returns outcomes for all tasks that reached a terminal state
    /// within the timeout.
    pub fn wait_all(&self, timeout: Option<Duration>) -> HashMap<TaskId, Arc<TaskResult<T, E>>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut tasks = self.shared.tasks.lock();
        loop {
            let pending = tasks.values().any(|entry| entry.outcome.is_none());
            if !pending {
                break;
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .completion
                        .wait_until(&mut tasks, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                None => self.shared.completion.wait(&mut tasks),
            }
        }

        tasks
            .iter()
            .filter_map(|(id, entry)| entry.outcome.clone().map(|o| (id.clone(), o)))
            .collect()
    }

    /// Drop terminal tasks from the table. Returns the count removed.
    pub fn cleanup_completed(&self) -> usize {
        let mut tasks = self.shared.tasks.lock();
        let before = tasks.len();
        tasks.retain(|_, entry| !entry.status.is_terminal());
        before - tasks.len()
    }

    /// Count of tasks currently executing.
    pub fn active_count(&self) -> usize {
        self.shared
            .tasks
            .lock()
            .values()
            .filter(|entry| entry.status == TaskStatus::Running)
            .count()
    }

    /// Count of tasks waiting to start.
    pub fn pending_count(&self) -> usize {
        self.shared
            .tasks
            .lock()
            .values()
            .filter(|entry| entry.status == TaskStatus::Pending)
            .count()
    }

    /// Shut down the pool.
    ///
    /// New submissions are rejected, all tracked tasks are cancelled,
    /// and the queue is closed. With `wait` set, blocks until running
    /// tasks have drained (bounded by `timeout`) before joining workers.
    pub fn shutdown(&self, wait: bool, timeout: Option<Duration>) {
        *self.shared.closed.lock() = true;
        self.cancel_all();
        // Closing the channel lets idle workers exit their recv loop.
        self.sender.lock().take();

        if wait {
            self.wait_all(timeout);
        }

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let _ = handle.join();
        }
        tracing::info!("Worker pool shutdown complete");
    }
}

fn worker_loop<T, E>(shared: Arc<PoolShared<T, E>>, receiver: Receiver<QueuedTask<T, E>>)
where
    T: Send + Sync + 'static,
    E: std::fmt::Display + Send + Sync + 'static,
{
    while let Ok(task) = receiver.recv() {
        run_task(&shared, task);
    }
}

fn run_task<T, E>(shared: &PoolShared<T, E>, task: QueuedTask<T, E>)
where
    T: Send + Sync + 'static,
    E: std::fmt::Display + Send + Sync + 'static,
{
    let QueuedTask {
        id,
        func,
        on_complete,
    } = task;

    let token = {
        let mut tasks = shared.tasks.lock();
        let Some(entry) = tasks.get_mut(&id) else {
            return;
        };
        // Cancelled while still queued: never start it.
        if entry.token.is_cancelled() {
            let outcome = Arc::new(TaskResult {
                status: TaskStatus::Cancelled,
                result: None,
                error: None,
                elapsed: Duration::ZERO,
            });
            entry.status = TaskStatus::Cancelled;
            entry.outcome = Some(outcome.clone());
            drop(tasks);
            shared.completion.notify_all();
            fire_completion(&id, on_complete, &outcome);
            return;
        }
        entry.status = TaskStatus::Running;
        entry.token.clone()
    };

    let start = Instant::now();
    let output = func(&token);
    let elapsed = start.elapsed();

    let (status, result, error) = match output {
        Ok(value) if token.is_cancelled() => (TaskStatus::Cancelled, Some(value), None),
        Ok(value) => (TaskStatus::Completed, Some(value), None),
        Err(_) if token.is_cancelled() => (TaskStatus::Cancelled, None, None),
        Err(e) => {
            tracing::error!("Task {} failed: {}", id, e);
            (TaskStatus::Failed, None, Some(e))
        }
    };

    let outcome = Arc::new(TaskResult {
        status,
        result,
        error,
        elapsed,
    });

    {
        let mut tasks = shared.tasks.lock();
        if let Some(entry) = tasks.get_mut(&id) {
            entry.status = status;
            entry.outcome = Some(outcome.clone());
            tracing::debug!("Task {} ({}) finished: {:?}", id, entry.name, status);
        }
    }
    shared.completion.notify_all();
    fire_completion(&id, on_complete, &outcome);
}

fn fire_completion<T, E>(
    id: &str,
    on_complete: Option<CompletionFn<T, E>>,
    outcome: &Arc<TaskResult<T, E>>,
) {
    if let Some(callback) = on_complete {
        if catch_unwind(AssertUnwindSafe(|| callback(outcome))).is_err() {
            tracing::warn!("Completion callback for task {} panicked", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type TestPool = WorkerPool<u32, String>;

    #[test]
    fn submit_and_collect_result() {
        let pool = TestPool::new(2).unwrap();
        let id = pool
            .submit(|_token| Ok(41 + 1), "math", None, None, None)
            .unwrap();

        let outcome = pool.result(&id, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(outcome.status, TaskStatus::Completed);
        assert_eq!(outcome.result, Some(42));
        pool.shutdown(true, None);
    }

    #[test]
    fn failed_task_records_error() {
        let pool = TestPool::new(1).unwrap();
        let id = pool
            .submit(
                |_token| Err("exploded".to_string()),
                "boom",
                None,
                None,
                None,
            )
            .unwrap();

        let outcome = pool.result(&id, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(outcome.status, TaskStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("exploded"));
        pool.shutdown(true, None);
    }

    #[test]
    fn running_task_exits_at_token_check() {
        let pool = TestPool::new(1).unwrap();
        let id = pool
            .submit(
                |token| {
                    // Block until cancelled, then report it.
                    token.wait(Some(Duration::from_secs(10)));
                    Err("cancelled".to_string())
                },
                "long",
                None,
                None,
                None,
            )
            .unwrap();

        // Let the worker pick it up, then cancel.
        std::thread::sleep(Duration::from_millis(20));
        assert!(pool.cancel(&id));

        let outcome = pool.result(&id, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(outcome.status, TaskStatus::Cancelled);
        assert!(outcome.error.is_none());
        pool.shutdown(true, None);
    }

    #[test]
    fn queued_task_cancelled_before_start() {
        let pool = TestPool::new(1).unwrap();

        // Occupy the single worker.
        let blocker_token = CancellationToken::new();
        let blocker = pool
            .submit(
                |token| {
                    token.wait(None);
                    Ok(0)
                },
                "blocker",
                None,
                Some(blocker_token.clone()),
                None,
            )
            .unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        let queued = pool
            .submit(
                move |_token| {
                    ran_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                },
                "queued",
                None,
                None,
                None,
            )
            .unwrap();

        assert!(pool.cancel(&queued));
        blocker_token.cancel();

        let outcome = pool.result(&queued, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(outcome.status, TaskStatus::Cancelled);
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        let _ = pool.result(&blocker, Some(Duration::from_secs(5)));
        pool.shutdown(true, None);
    }

    #[test]
    fn on_complete_fires_with_outcome() {
        let pool = TestPool::new(1).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        let id = pool
            .submit(
                |_token| Ok(7),
                "cb",
                None,
                None,
                Some(Box::new(move |result| {
                    if result.status == TaskStatus::Completed {
                        fired_clone.fetch_add(1, Ordering::SeqCst);
                    }
                })),
            )
            .unwrap();

        pool.result(&id, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        pool.shutdown(true, None);
    }

    #[test]
    fn wait_all_returns_every_outcome() {
        let pool = TestPool::new(4).unwrap();
        for i in 0..6 {
            pool.submit(move |_token| Ok(i), "batch", None, None, None)
                .unwrap();
        }

        let outcomes = pool.wait_all(Some(Duration::from_secs(5)));
        assert_eq!(outcomes.len(), 6);
        assert!(outcomes
            .values()
            .all(|o| o.status == TaskStatus::Completed));
        pool.shutdown(true, None);
    }

    #[test]
    fn cleanup_completed_drops_terminal_tasks() {
        let pool = TestPool::new(2).unwrap();
        let id = pool
            .submit(|_token| Ok(1), "done", None, None, None)
            .unwrap();
        pool.result(&id, Some(Duration::from_secs(5))).unwrap();

        assert_eq!(pool.cleanup_completed(), 1);
        assert!(pool.status(&id).is_none());
        pool.shutdown(true, None);
    }

    #[test]
    fn submit_after_shutdown_is_rejected() {
        let pool = TestPool::new(1).unwrap();
        pool.shutdown(true, None);

        let err = pool
            .submit(|_token| Ok(1), "late", None, None, None)
            .unwrap_err();
        assert_eq!(err, PoolError::Closed);
    }

    #[test]
    fn explicit_task_ids_are_honored() {
        let pool = TestPool::new(1).unwrap();
        let id = pool
            .submit(
                |_token| Ok(9),
                "named",
                Some("job-abc".to_string()),
                None,
                None,
            )
            .unwrap();
        assert_eq!(id, "job-abc");
        pool.result(&id, Some(Duration::from_secs(5))).unwrap();
        pool.shutdown(true, None);
    }
}
