//! Materializes the step list from a workflow config.

use crate::models::InputKind;

use super::config::WorkflowConfig;
use super::step::{StepName, StepSettings, WorkflowStep};

/// Build the four workflow steps in fixed pipeline order.
///
/// Only `extract_audio` carries a `required_input_kind`; the other
/// three are gated at runtime by engine state (audio slot, transcript
/// slot) rather than up front.
pub fn build_steps(config: &WorkflowConfig) -> Vec<WorkflowStep> {
    vec![
        WorkflowStep {
            name: StepName::ExtractAudio,
            enabled: config.extract_audio,
            required_input_kind: Some(InputKind::Video),
            settings: StepSettings::Extract {
                format: config.audio_format,
                quality: config.audio_quality,
            },
        },
        WorkflowStep {
            name: StepName::ProcessAudio,
            enabled: config.process_audio,
            required_input_kind: None,
            settings: StepSettings::Process {
                increase_volume: config.increase_volume,
                volume_gain_db: config.volume_gain_db,
                normalize_audio: config.normalize_audio,
                output_formats: config.output_formats.clone(),
            },
        },
        WorkflowStep {
            name: StepName::Transcribe,
            enabled: config.transcribe,
            required_input_kind: None,
            settings: StepSettings::Transcribe {
                model: config.transcribe_model.clone(),
                language: config.language.clone(),
            },
        },
        WorkflowStep {
            name: StepName::Summarize,
            enabled: config.summarize,
            required_input_kind: None,
            settings: StepSettings::Summarize {
                template: config.summary_template,
                provider: config.provider,
                model: config.model.clone(),
                auto_detect: config.auto_detect_template,
            },
        },
    ]
}

/// Keep only the steps whose gates allow execution for `kind`.
pub fn filter_executable_steps(steps: Vec<WorkflowStep>, kind: InputKind) -> Vec<WorkflowStep> {
    steps
        .into_iter()
        .filter(|step| step.can_execute(kind))
        .collect()
}
