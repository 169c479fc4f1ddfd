//! Persistent job history, one JSON file per job.
//!
//! Files are stored for durability and easy inspection. There is no
//! in-memory locking: file-per-job isolation keeps concurrent engines
//! apart, but racing updates to the same id can lose the earlier patch.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::models::JobStatus;

/// Suffix of live checkpoint files sharing the jobs directory; history
/// scans skip them.
const STATE_FILE_SUFFIX: &str = ".state.json";

/// Durable per-job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub job_type: String,
    pub status: JobStatus,
    pub input_file: PathBuf,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Arbitrary caller-supplied metadata.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobRecord {
    /// Create a freshly-started record.
    pub fn new(
        job_id: impl Into<String>,
        job_type: impl Into<String>,
        input_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            job_type: job_type.into(),
            status: JobStatus::Started,
            input_file: input_file.into(),
            started_at: Local::now().to_rfc3339(),
            updated_at: None,
            completed_at: None,
            failed_at: None,
            saved_at: None,
            outputs: None,
            error_message: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Aggregate statistics over the history store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub oldest: Option<String>,
    pub newest: Option<String>,
}

/// Persistent storage for job history.
#[derive(Debug, Clone)]
pub struct JobHistoryStore {
    path: PathBuf,
}

impl JobHistoryStore {
    /// Create a store rooted at `path`, creating the directory.
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// The storage directory.
    pub fn storage_path(&self) -> &Path {
        &self.path
    }

    fn job_file(&self, job_id: &str) -> PathBuf {
        self.path.join(format!("{}.json", job_id))
    }

    /// Save a record, replacing any prior file and stamping `saved_at`
    /// if not already set.
    pub fn save_job(&self, record: &JobRecord) -> io::Result<()> {
        let mut record = record.clone();
        if record.saved_at.is_none() {
            record.saved_at = Some(Local::now().to_rfc3339());
        }

        let json = serde_json::to_string_pretty(&record).map_err(io::Error::other)?;
        let file_path = self.job_file(&record.job_id);
        fs::write(&file_path, json).inspect_err(|e| {
            tracing::error!("Failed to save job {}: {}", record.job_id, e);
        })?;
        tracing::debug!("Saved job {} to {}", record.job_id, file_path.display());
        Ok(())
    }

    /// Load a record by id.
    ///
    /// Returns `None` for both absent and malformed files; the latter
    /// logs a warning.
    pub fn get_job(&self, job_id: &str) -> Option<JobRecord> {
        let file_path = self.job_file(job_id);
        if !file_path.exists() {
            return None;
        }
        read_record(&file_path)
    }

    /// Read-modify-write update. Applies `patch` to the stored record
    /// and stamps `updated_at`. Returns true iff the job existed.
    pub fn update_job<F>(&self, job_id: &str, patch: F) -> io::Result<bool>
    where
        F: FnOnce(&mut JobRecord),
    {
        let Some(mut record) = self.get_job(job_id) else {
            return Ok(false);
        };
        patch(&mut record);
        record.updated_at = Some(Local::now().to_rfc3339());
        self.save_job(&record)?;
        Ok(true)
    }

    /// List recent jobs, newest first by file modification time.
    ///
    /// Best-effort ordering: concurrent writers may produce duplicates
    /// or reorderings within a scan. Filters apply while reading and at
    /// most `limit` records are returned.
    pub fn list_jobs(
        &self,
        limit: usize,
        status: Option<JobStatus>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<JobRecord> {
        let mut files = self.record_files();
        files.sort_by(|a, b| b.1.cmp(&a.1));

        let mut jobs = Vec::new();
        for (path, _mtime) in files {
            let Some(record) = read_record(&path) else {
                continue;
            };
            if let Some(wanted) = status {
                if record.status != wanted {
                    continue;
                }
            }
            if let Some(since) = since {
                match DateTime::parse_from_rfc3339(&record.started_at) {
                    Ok(started) if started.with_timezone(&Utc) < since => continue,
                    _ => {}
                }
            }
            jobs.push(record);
            if jobs.len() >= limit {
                break;
            }
        }
        jobs
    }

    /// Delete a job record. Idempotent; returns true if a file was
    /// removed.
    pub fn delete_job(&self, job_id: &str) -> bool {
        let file_path = self.job_file(job_id);
        if !file_path.exists() {
            return false;
        }
        match fs::remove_file(&file_path) {
            Ok(()) => {
                tracing::debug!("Deleted job {}", job_id);
                true
            }
            Err(e) => {
                tracing::error!("Failed to delete job {}: {}", job_id, e);
                false
            }
        }
    }

    /// Remove records whose file mtime is older than `days` days.
    /// Returns the count removed.
    pub fn cleanup_old_jobs(&self, days: u32) -> usize {
        let cutoff =
            SystemTime::now() - std::time::Duration::from_secs(u64::from(days) * 86_400);
        let mut removed = 0;

        for (path, mtime) in self.record_files() {
            if mtime < cutoff {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        removed += 1;
                        tracing::debug!("Cleaned up old job file: {}", path.display());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to cleanup job file {}: {}", path.display(), e)
                    }
                }
            }
        }

        if removed > 0 {
            tracing::info!("Cleaned up {} old job files", removed);
        }
        removed
    }

    /// Counts by status plus oldest/newest start times.
    pub fn get_stats(&self) -> HistoryStats {
        let mut stats = HistoryStats::default();

        for (path, _mtime) in self.record_files() {
            stats.total += 1;
            let Some(record) = read_record(&path) else {
                continue;
            };
            *stats
                .by_status
                .entry(record.status.to_string())
                .or_insert(0) += 1;

            let started = record.started_at;
            if stats
                .oldest
                .as_ref()
                .is_none_or(|oldest| started < *oldest)
            {
                stats.oldest = Some(started.clone());
            }
            if stats
                .newest
                .as_ref()
                .is_none_or(|newest| started > *newest)
            {
                stats.newest = Some(started);
            }
        }

        stats
    }

    /// Record the start of a job.
    pub fn record_start(&self, record: &JobRecord) -> io::Result<()> {
        self.save_job(record)
    }

    /// Record successful completion with output paths.
    pub fn record_complete(
        &self,
        job_id: &str,
        outputs: BTreeMap<String, String>,
    ) -> io::Result<bool> {
        self.update_job(job_id, |record| {
            record.status = JobStatus::Completed;
            record.completed_at = Some(Local::now().to_rfc3339());
            record.outputs = Some(outputs);
        })
    }

    /// Record a failure with its error message.
    pub fn record_failure(&self, job_id: &str, error_message: &str) -> io::Result<bool> {
        let error_message = error_message.to_string();
        self.update_job(job_id, move |record| {
            record.status = JobStatus::Failed;
            record.failed_at = Some(Local::now().to_rfc3339());
            record.error_message = Some(error_message);
        })
    }

    /// History record files with their mtimes, excluding live
    /// checkpoint files.
    fn record_files(&self) -> Vec<(PathBuf, SystemTime)> {
        let Ok(entries) = fs::read_dir(&self.path) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                let name = path.file_name()?.to_string_lossy().to_string();
                if !name.ends_with(".json") || name.ends_with(STATE_FILE_SUFFIX) {
                    return None;
                }
                let mtime = entry.metadata().ok()?.modified().ok()?;
                Some((path, mtime))
            })
            .collect()
    }
}

fn read_record(path: &Path) -> Option<JobRecord> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read job file {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Malformed job file {}: {}", path.display(), e);
            None
        }
    }
}
