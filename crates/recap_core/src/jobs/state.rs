//! Live per-job checkpoint files for shutdown recovery.
//!
//! A [`JobStateManager`] owns the `.state.json` file of the currently
//! running job. On shutdown a registered cleanup handler rewrites the
//! file with `status: "interrupted"` so the next process start can
//! discover and offer to resume the work. The handler does not cancel
//! the running worker; callers cancel explicitly via the pool.
//!
//! Writes are truncate-and-rewrite: a crash between write-begin and
//! flush leaves the prior state on disk, which callers accept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::shutdown::{CleanupHandle, ShutdownManager};

/// Status of a live job checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Interrupted,
}

/// Checkpoint contents for one running job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Caller-supplied fields (stage cursor, input file, and so on).
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

struct CurrentJob {
    state: JobState,
    cleanup: CleanupHandle,
}

/// Manages the live checkpoint of the job this engine run owns.
#[derive(Clone)]
pub struct JobStateManager {
    jobs_dir: PathBuf,
    shutdown: ShutdownManager,
    current: Arc<Mutex<Option<CurrentJob>>>,
}

impl JobStateManager {
    /// Create a manager writing under `jobs_dir`, creating it if
    /// needed.
    pub fn new(jobs_dir: impl Into<PathBuf>, shutdown: ShutdownManager) -> std::io::Result<Self> {
        let jobs_dir = jobs_dir.into();
        fs::create_dir_all(&jobs_dir)?;
        Ok(Self {
            jobs_dir,
            shutdown,
            current: Arc::new(Mutex::new(None)),
        })
    }

    /// Begin tracking a job: write the `running` checkpoint and hook
    /// the shutdown manager so an exit marks it `interrupted`.
    pub fn start_job(&self, job_id: impl Into<String>, initial: serde_json::Map<String, serde_json::Value>) {
        let job_id = job_id.into();
        let state = JobState {
            job_id: job_id.clone(),
            status: RunStatus::Running,
            updated_at: None,
            fields: initial,
        };

        let current = self.current.clone();
        let jobs_dir = self.jobs_dir.clone();
        let cleanup = self.shutdown.register_cleanup_handler(move || {
            let mut guard = current.lock();
            if let Some(job) = guard.as_mut() {
                job.state.status = RunStatus::Interrupted;
                persist_state(&jobs_dir, &mut job.state);
                tracing::info!("Saved interrupted state for job {}", job.state.job_id);
            }
        });

        let mut guard = self.current.lock();
        *guard = Some(CurrentJob { state, cleanup });
        if let Some(job) = guard.as_mut() {
            persist_state(&self.jobs_dir, &mut job.state);
        }
        tracing::debug!("Started tracking job state for {}", job_id);
    }

    /// Merge fields into the current state and persist.
    pub fn update_state(&self, fields: serde_json::Map<String, serde_json::Value>) {
        let mut guard = self.current.lock();
        if let Some(job) = guard.as_mut() {
            job.state.fields.extend(fields);
            persist_state(&self.jobs_dir, &mut job.state);
        }
    }

    /// Mark the job completed and stop tracking it. Later signals no
    /// longer flip the state to `interrupted`.
    pub fn complete_job(&self, result: Option<serde_json::Value>) {
        self.finish(RunStatus::Completed, result.map(|r| ("result", r)));
    }

    /// Mark the job failed and stop tracking it.
    pub fn fail_job(&self, error: &str) {
        self.finish(
            RunStatus::Failed,
            Some(("error", serde_json::Value::String(error.to_string()))),
        );
    }

    fn finish(&self, status: RunStatus, field: Option<(&str, serde_json::Value)>) {
        let mut guard = self.current.lock();
        if let Some(mut job) = guard.take() {
            job.state.status = status;
            if let Some((key, value)) = field {
                job.state.fields.insert(key.to_string(), value);
            }
            persist_state(&self.jobs_dir, &mut job.state);
            self.shutdown.unregister_cleanup_handler(job.cleanup);
        }
    }

    /// The job id currently being tracked, if any.
    pub fn current_job_id(&self) -> Option<String> {
        self.current
            .lock()
            .as_ref()
            .map(|job| job.state.job_id.clone())
    }

    /// Scan the jobs directory for checkpoints left `interrupted`.
    pub fn get_interrupted_jobs(&self) -> Vec<JobState> {
        let Ok(entries) = fs::read_dir(&self.jobs_dir) else {
            return Vec::new();
        };

        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if !path
                    .file_name()?
                    .to_string_lossy()
                    .ends_with(".state.json")
                {
                    return None;
                }
                let state: JobState = serde_json::from_str(&fs::read_to_string(&path).ok()?).ok()?;
                (state.status == RunStatus::Interrupted).then_some(state)
            })
            .collect()
    }
}

fn state_file(jobs_dir: &Path, job_id: &str) -> PathBuf {
    jobs_dir.join(format!("{}.state.json", job_id))
}

/// Truncate-rewrite the checkpoint, stamping `updated_at`. Failures
/// are logged, not raised; losing a checkpoint must not fail the job.
fn persist_state(jobs_dir: &Path, state: &mut JobState) {
    state.updated_at = Some(Local::now().to_rfc3339());
    let path = state_file(jobs_dir, &state.job_id);
    match serde_json::to_string_pretty(state) {
        Ok(json) => {
            if let Err(e) = fs::write(&path, json) {
                tracing::warn!("Failed to save job state: {}", e);
            }
        }
        Err(e) => tracing::warn!("Failed to serialize job state: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fields(entries: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    fn read_state(dir: &Path, job_id: &str) -> JobState {
        let content = fs::read_to_string(state_file(dir, job_id)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[test]
    fn start_job_writes_running_state() {
        let dir = tempdir().unwrap();
        let shutdown = ShutdownManager::new();
        let manager = JobStateManager::new(dir.path(), shutdown).unwrap();

        manager.start_job("job-1", fields(&[("input_file", "/in/call.mp4")]));

        let state = read_state(dir.path(), "job-1");
        assert_eq!(state.status, RunStatus::Running);
        assert_eq!(state.fields["input_file"], "/in/call.mp4");
        assert!(state.updated_at.is_some());
        assert_eq!(manager.current_job_id().as_deref(), Some("job-1"));
    }

    #[test]
    fn update_merges_fields() {
        let dir = tempdir().unwrap();
        let manager = JobStateManager::new(dir.path(), ShutdownManager::new()).unwrap();

        manager.start_job("job-2", fields(&[("stage", "extract_audio")]));
        manager.update_state(fields(&[("stage", "transcribe")]));

        let state = read_state(dir.path(), "job-2");
        assert_eq!(state.fields["stage"], "transcribe");
    }

    #[test]
    fn shutdown_marks_running_job_interrupted() {
        let dir = tempdir().unwrap();
        let shutdown = ShutdownManager::new();
        let manager = JobStateManager::new(dir.path(), shutdown.clone()).unwrap();

        manager.start_job("job-3", fields(&[]));
        shutdown.request_shutdown();
        shutdown.run_cleanup();

        let state = read_state(dir.path(), "job-3");
        assert_eq!(state.status, RunStatus::Interrupted);

        let interrupted = manager.get_interrupted_jobs();
        assert_eq!(interrupted.len(), 1);
        assert_eq!(interrupted[0].job_id, "job-3");
    }

    #[test]
    fn completed_job_is_not_marked_interrupted() {
        let dir = tempdir().unwrap();
        let shutdown = ShutdownManager::new();
        let manager = JobStateManager::new(dir.path(), shutdown.clone()).unwrap();

        manager.start_job("job-4", fields(&[]));
        manager.complete_job(Some(serde_json::json!({"summary": "/out/s.md"})));

        // A shutdown after completion must not flip the state.
        shutdown.run_cleanup();

        let state = read_state(dir.path(), "job-4");
        assert_eq!(state.status, RunStatus::Completed);
        assert_eq!(state.fields["result"]["summary"], "/out/s.md");
        assert!(manager.get_interrupted_jobs().is_empty());
        assert!(manager.current_job_id().is_none());
    }

    #[test]
    fn failed_job_records_error() {
        let dir = tempdir().unwrap();
        let shutdown = ShutdownManager::new();
        let manager = JobStateManager::new(dir.path(), shutdown.clone()).unwrap();

        manager.start_job("job-5", fields(&[]));
        manager.fail_job("stt provider unreachable");
        shutdown.run_cleanup();

        let state = read_state(dir.path(), "job-5");
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.fields["error"], "stt provider unreachable");
    }

    #[test]
    fn interrupted_scan_ignores_other_statuses_and_junk() {
        let dir = tempdir().unwrap();
        let manager = JobStateManager::new(dir.path(), ShutdownManager::new()).unwrap();

        fs::write(
            state_file(dir.path(), "done"),
            r#"{"job_id": "done", "status": "completed"}"#,
        )
        .unwrap();
        fs::write(
            state_file(dir.path(), "broken"),
            "not json",
        )
        .unwrap();
        fs::write(
            state_file(dir.path(), "stuck"),
            r#"{"job_id": "stuck", "status": "interrupted"}"#,
        )
        .unwrap();
        // A history record in the same directory is not a checkpoint.
        fs::write(dir.path().join("other.json"), r#"{"job_id": "other"}"#).unwrap();

        let interrupted = manager.get_interrupted_jobs();
        assert_eq!(interrupted.len(), 1);
        assert_eq!(interrupted[0].job_id, "stuck");
    }
}
