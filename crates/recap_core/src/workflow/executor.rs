//! Sequential step runner with progress emission.

use std::collections::BTreeMap;

use crate::concurrency::CancellationToken;

use super::errors::{StageError, WorkflowError};
use super::progress::ProgressCallback;
use super::result::StageResult;
use super::step::{StepName, WorkflowStep};

/// Executes workflow steps in order, emitting progress and wrapping
/// failures with step context.
///
/// The cancellation token is checked at every stage boundary; the
/// steps themselves check it again before each external capability
/// call.
#[derive(Clone)]
pub struct WorkflowExecutor {
    token: CancellationToken,
}

impl WorkflowExecutor {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Run the steps in order through `run_step`.
    ///
    /// For each step: emit `(i+1, N, name, "Executing {name}...")`,
    /// check for cancellation, dispatch, and store the result under
    /// the step name. A failing step aborts the walk wrapped with its
    /// step name; cancellation and shutdown propagate undisturbed.
    /// After the last step a final `(N, N, "complete", ...)` is
    /// emitted.
    pub fn execute_steps<F>(
        &self,
        steps: &[WorkflowStep],
        progress: Option<&ProgressCallback>,
        mut run_step: F,
    ) -> Result<BTreeMap<StepName, StageResult>, WorkflowError>
    where
        F: FnMut(&WorkflowStep) -> Result<StageResult, StageError>,
    {
        let total = steps.len();
        let mut results = BTreeMap::new();

        for (i, step) in steps.iter().enumerate() {
            emit(
                progress,
                i + 1,
                total,
                step.name.as_str(),
                &format!("Executing {}...", step.name),
            );

            if let Err(e) = self.token.check() {
                tracing::warn!("Workflow cancelled before step '{}'", step.name);
                return Err(WorkflowError::from_step(step.name, e.into()));
            }

            tracing::info!("Executing step {}/{}: {}", i + 1, total, step.name);
            match run_step(step) {
                Ok(result) => {
                    results.insert(step.name, result);
                    tracing::info!("Completed step: {}", step.name);
                }
                Err(e) => {
                    tracing::error!("Error in step '{}': {}", step.name, e);
                    return Err(WorkflowError::from_step(step.name, e));
                }
            }
        }

        emit(
            progress,
            total,
            total,
            "complete",
            "Workflow completed successfully",
        );
        Ok(results)
    }
}

fn emit(
    progress: Option<&ProgressCallback>,
    step: usize,
    total: usize,
    step_name: &str,
    message: &str,
) {
    if let Some(callback) = progress {
        callback(step, total, step_name, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudioFormat, AudioQuality};
    use crate::workflow::step::StepSettings;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn make_steps(names: &[StepName]) -> Vec<WorkflowStep> {
        names
            .iter()
            .map(|&name| WorkflowStep {
                name,
                enabled: true,
                required_input_kind: None,
                settings: StepSettings::Extract {
                    format: AudioFormat::M4a,
                    quality: AudioQuality::High,
                },
            })
            .collect()
    }

    fn collecting_callback() -> (ProgressCallback, Arc<Mutex<Vec<(usize, usize, String)>>>) {
        let events: Arc<Mutex<Vec<(usize, usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: ProgressCallback = Box::new(move |step, total, name, _message| {
            sink.lock().push((step, total, name.to_string()));
        });
        (callback, events)
    }

    #[test]
    fn steps_run_in_order_with_progress() {
        let executor = WorkflowExecutor::new(CancellationToken::new());
        let steps = make_steps(&[StepName::Transcribe, StepName::Summarize]);
        let (callback, events) = collecting_callback();

        let order = Arc::new(Mutex::new(Vec::new()));
        let order_sink = order.clone();
        let results = executor
            .execute_steps(&steps, Some(&callback), |step| {
                order_sink.lock().push(step.name);
                Ok(StageResult::skipped("test"))
            })
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(
            *order.lock(),
            vec![StepName::Transcribe, StepName::Summarize]
        );

        let events = events.lock();
        assert_eq!(events[0], (1, 2, "transcribe".to_string()));
        assert_eq!(events[1], (2, 2, "summarize".to_string()));
        assert_eq!(events[2], (2, 2, "complete".to_string()));
    }

    #[test]
    fn progress_is_monotonic() {
        let executor = WorkflowExecutor::new(CancellationToken::new());
        let steps = make_steps(&[
            StepName::ExtractAudio,
            StepName::ProcessAudio,
            StepName::Transcribe,
            StepName::Summarize,
        ]);
        let (callback, events) = collecting_callback();

        executor
            .execute_steps(&steps, Some(&callback), |_| Ok(StageResult::skipped("x")))
            .unwrap();

        let events = events.lock();
        for pair in events.windows(2) {
            assert!(pair[0].0 <= pair[1].0, "step index went backwards");
            assert!(pair[1].0 <= pair[1].1, "step index exceeded total");
        }
        assert_eq!(events.last().unwrap().2, "complete");
    }

    #[test]
    fn failing_step_wraps_with_name_and_aborts() {
        let executor = WorkflowExecutor::new(CancellationToken::new());
        let steps = make_steps(&[StepName::Transcribe, StepName::Summarize]);

        let ran = Arc::new(Mutex::new(Vec::new()));
        let ran_sink = ran.clone();
        let err = executor
            .execute_steps(&steps, None, |step| {
                ran_sink.lock().push(step.name);
                Err(StageError::transcription("poll failed"))
            })
            .unwrap_err();

        match err {
            WorkflowError::StepFailed { step, .. } => assert_eq!(step, StepName::Transcribe),
            other => panic!("unexpected error: {:?}", other),
        }
        // The walk aborted; summarize never ran.
        assert_eq!(*ran.lock(), vec![StepName::Transcribe]);
    }

    #[test]
    fn cancellation_stops_at_stage_boundary() {
        let token = CancellationToken::new();
        let executor = WorkflowExecutor::new(token.clone());
        let steps = make_steps(&[StepName::Transcribe, StepName::Summarize]);

        let cancel_after_first = token.clone();
        let ran = Arc::new(Mutex::new(Vec::new()));
        let ran_sink = ran.clone();
        let err = executor
            .execute_steps(&steps, None, |step| {
                ran_sink.lock().push(step.name);
                cancel_after_first.cancel();
                Ok(StageResult::skipped("x"))
            })
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Cancelled));
        assert_eq!(*ran.lock(), vec![StepName::Transcribe]);
    }

    #[test]
    fn empty_step_list_completes_immediately() {
        let executor = WorkflowExecutor::new(CancellationToken::new());
        let (callback, events) = collecting_callback();

        let results = executor
            .execute_steps(&[], Some(&callback), |_| Ok(StageResult::skipped("x")))
            .unwrap();

        assert!(results.is_empty());
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].2, "complete");
    }
}
