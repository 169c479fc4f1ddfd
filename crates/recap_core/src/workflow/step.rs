//! Declarative workflow step records.

use serde::{Deserialize, Serialize};

use crate::models::{AudioFormat, AudioQuality, InputKind, Provider, SummaryTemplate};

/// The four named phases of the workflow, in execution order.
///
/// The `Ord` derive follows declaration order, which is the pipeline
/// order; result maps keyed by step name iterate in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    ExtractAudio,
    ProcessAudio,
    Transcribe,
    Summarize,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::ExtractAudio => "extract_audio",
            StepName::ProcessAudio => "process_audio",
            StepName::Transcribe => "transcribe",
            StepName::Summarize => "summarize",
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-step settings, materialized from the workflow config.
#[derive(Debug, Clone, PartialEq)]
pub enum StepSettings {
    Extract {
        format: AudioFormat,
        quality: AudioQuality,
    },
    Process {
        increase_volume: bool,
        volume_gain_db: f64,
        normalize_audio: bool,
        output_formats: Vec<AudioFormat>,
    },
    Transcribe {
        model: String,
        language: String,
    },
    Summarize {
        template: SummaryTemplate,
        provider: Provider,
        model: String,
        auto_detect: bool,
    },
}

/// One declarative pipeline step: a name, an enablement gate, an
/// optional input-kind requirement, and its settings.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub name: StepName,
    pub enabled: bool,
    pub required_input_kind: Option<InputKind>,
    pub settings: StepSettings,
}

impl WorkflowStep {
    /// Whether this step can execute for the given input kind.
    pub fn can_execute(&self, kind: InputKind) -> bool {
        self.enabled
            && self
                .required_input_kind
                .is_none_or(|required| required == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(enabled: bool, required: Option<InputKind>) -> WorkflowStep {
        WorkflowStep {
            name: StepName::ExtractAudio,
            enabled,
            required_input_kind: required,
            settings: StepSettings::Extract {
                format: AudioFormat::M4a,
                quality: AudioQuality::High,
            },
        }
    }

    #[test]
    fn can_execute_honors_gate_and_kind() {
        assert!(step(true, None).can_execute(InputKind::Audio));
        assert!(!step(false, None).can_execute(InputKind::Audio));
        assert!(step(true, Some(InputKind::Video)).can_execute(InputKind::Video));
        assert!(!step(true, Some(InputKind::Video)).can_execute(InputKind::Audio));
    }

    #[test]
    fn step_names_serialize_snake_case() {
        let json = serde_json::to_string(&StepName::ExtractAudio).unwrap();
        assert_eq!(json, "\"extract_audio\"");
        assert_eq!(StepName::Summarize.to_string(), "summarize");
    }

    #[test]
    fn step_name_order_matches_pipeline_order() {
        let mut names = vec![
            StepName::Summarize,
            StepName::ExtractAudio,
            StepName::Transcribe,
            StepName::ProcessAudio,
        ];
        names.sort();
        assert_eq!(
            names,
            vec![
                StepName::ExtractAudio,
                StepName::ProcessAudio,
                StepName::Transcribe,
                StepName::Summarize,
            ]
        );
    }
}
