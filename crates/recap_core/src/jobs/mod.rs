//! Durable job state: history records and live checkpoints.
//!
//! Two distinct artifacts live under `data/jobs/`:
//!
//! - `{job_id}.json` — the durable [`JobRecord`] history entry, kept
//!   for observability and retention-managed cleanup.
//! - `{job_id}.state.json` — the live [`JobState`] checkpoint written
//!   by the running engine, marked `interrupted` on shutdown and
//!   scanned on the next start for resumable work.

mod history;
mod state;

pub use history::{HistoryStats, JobHistoryStore, JobRecord};
pub use state::{JobState, JobStateManager, RunStatus};

/// Generate a fresh job id.
///
/// One end-to-end engine invocation gets one id, shared by its history
/// record and its state checkpoint.
pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_unique_uuids() {
        let a = new_job_id();
        let b = new_job_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }
}
