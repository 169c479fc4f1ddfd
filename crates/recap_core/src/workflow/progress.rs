//! Progress reporting types.
//!
//! The engine invokes the callback on the executor's thread; callers
//! that need delivery on another thread marshal it themselves, e.g.
//! through a message queue. [`ProgressTracker`] folds the raw callback
//! events into a per-stage snapshot for callers that want state rather
//! than a stream.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Progress callback: `(step_index, total_steps, step_name, message)`.
///
/// Invocations for one run are totally ordered and monotonic in
/// `step_index`; the final invocation carries step name `"complete"`.
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str, &str) + Send + Sync>;

/// Lifecycle of one stage as seen by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Active,
    Complete,
    Error,
}

/// Per-stage progress snapshot entry.
#[derive(Debug, Clone, Serialize)]
pub struct StageProgress {
    pub status: StageStatus,
    pub elapsed_seconds: f64,
    pub message: String,
}

/// Snapshot of overall workflow progress.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowProgress {
    pub overall_percent: u32,
    pub current_stage: Option<String>,
    pub stage_message: String,
    pub per_stage: BTreeMap<String, StageProgress>,
}

struct TrackerState {
    progress: WorkflowProgress,
    stage_started: BTreeMap<String, Instant>,
}

/// Folds progress-callback events into a [`WorkflowProgress`] snapshot.
pub struct ProgressTracker {
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TrackerState {
                progress: WorkflowProgress::default(),
                stage_started: BTreeMap::new(),
            }),
        })
    }

    /// Build a callback feeding this tracker.
    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let tracker = self.clone();
        Box::new(move |step, total, name, message| {
            tracker.update(step, total, name, message);
        })
    }

    /// Record one callback event.
    pub fn update(&self, step: usize, total: usize, step_name: &str, message: &str) {
        let mut state = self.state.lock();
        let now = Instant::now();

        if step_name == "complete" {
            finish_active(&mut state, now, StageStatus::Complete);
            state.progress.overall_percent = 100;
            state.progress.current_stage = None;
            state.progress.stage_message = message.to_string();
            return;
        }

        finish_active(&mut state, now, StageStatus::Complete);

        state.stage_started.insert(step_name.to_string(), now);
        state.progress.per_stage.insert(
            step_name.to_string(),
            StageProgress {
                status: StageStatus::Active,
                elapsed_seconds: 0.0,
                message: message.to_string(),
            },
        );
        state.progress.current_stage = Some(step_name.to_string());
        state.progress.stage_message = message.to_string();
        if total > 0 {
            state.progress.overall_percent = ((step.saturating_sub(1) * 100) / total) as u32;
        }
    }

    /// Mark the active stage as failed.
    pub fn mark_error(&self, message: &str) {
        let mut state = self.state.lock();
        let now = Instant::now();
        finish_active(&mut state, now, StageStatus::Error);
        state.progress.stage_message = message.to_string();
    }

    /// Current snapshot, with the active stage's elapsed time computed
    /// live.
    pub fn snapshot(&self) -> WorkflowProgress {
        let state = self.state.lock();
        let mut progress = state.progress.clone();
        if let Some(active) = &progress.current_stage {
            if let (Some(entry), Some(started)) = (
                progress.per_stage.get_mut(active),
                state.stage_started.get(active),
            ) {
                entry.elapsed_seconds = started.elapsed().as_secs_f64();
            }
        }
        progress
    }
}

fn finish_active(state: &mut TrackerState, now: Instant, status: StageStatus) {
    if let Some(active) = state.progress.current_stage.clone() {
        let elapsed = state
            .stage_started
            .get(&active)
            .map(|started| now.duration_since(*started).as_secs_f64())
            .unwrap_or(0.0);
        if let Some(entry) = state.progress.per_stage.get_mut(&active) {
            entry.status = status;
            entry.elapsed_seconds = elapsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_stage_transitions() {
        let tracker = ProgressTracker::new();
        tracker.update(1, 2, "transcribe", "Executing transcribe...");

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.current_stage.as_deref(), Some("transcribe"));
        assert_eq!(snapshot.overall_percent, 0);
        assert_eq!(
            snapshot.per_stage["transcribe"].status,
            StageStatus::Active
        );

        tracker.update(2, 2, "summarize", "Executing summarize...");
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.overall_percent, 50);
        assert_eq!(
            snapshot.per_stage["transcribe"].status,
            StageStatus::Complete
        );
        assert_eq!(snapshot.per_stage["summarize"].status, StageStatus::Active);
    }

    #[test]
    fn complete_event_finishes_everything() {
        let tracker = ProgressTracker::new();
        tracker.update(1, 1, "summarize", "Executing summarize...");
        tracker.update(1, 1, "complete", "Workflow completed successfully");

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.overall_percent, 100);
        assert!(snapshot.current_stage.is_none());
        assert_eq!(
            snapshot.per_stage["summarize"].status,
            StageStatus::Complete
        );
    }

    #[test]
    fn error_marks_active_stage() {
        let tracker = ProgressTracker::new();
        tracker.update(1, 2, "transcribe", "Executing transcribe...");
        tracker.mark_error("provider unreachable");

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.per_stage["transcribe"].status, StageStatus::Error);
        assert_eq!(snapshot.stage_message, "provider unreachable");
    }

    #[test]
    fn callback_feeds_tracker() {
        let tracker = ProgressTracker::new();
        let callback = tracker.callback();
        callback(1, 4, "extract_audio", "Executing extract_audio...");

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.current_stage.as_deref(), Some("extract_audio"));
    }
}
