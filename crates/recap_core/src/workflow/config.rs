//! Workflow configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::models::{AudioFormat, AudioQuality, InputKind, Provider, SummaryTemplate};
use crate::validation::ValidationError;

/// Configuration for one workflow execution. Immutable after the
/// engine validates it (validation canonicalizes `input_file`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    // File paths
    pub input_file: PathBuf,
    pub output_dir: PathBuf,

    // Step gates
    #[serde(default = "default_true")]
    pub extract_audio: bool,
    #[serde(default = "default_true")]
    pub process_audio: bool,
    #[serde(default = "default_true")]
    pub transcribe: bool,
    #[serde(default = "default_true")]
    pub summarize: bool,

    // Audio extraction
    #[serde(default)]
    pub audio_format: AudioFormat,
    #[serde(default)]
    pub audio_quality: AudioQuality,

    // Audio conditioning
    #[serde(default)]
    pub increase_volume: bool,
    #[serde(default = "default_volume_gain")]
    pub volume_gain_db: f64,
    #[serde(default = "default_true")]
    pub normalize_audio: bool,
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<AudioFormat>,

    // Transcription
    #[serde(default = "default_transcribe_model")]
    pub transcribe_model: String,
    #[serde(default = "default_language")]
    pub language: String,

    // Summarization
    #[serde(default)]
    pub summary_template: SummaryTemplate,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_true")]
    pub auto_detect_template: bool,
}

fn default_true() -> bool {
    true
}

fn default_volume_gain() -> f64 {
    10.0
}

fn default_output_formats() -> Vec<AudioFormat> {
    vec![AudioFormat::M4a]
}

fn default_transcribe_model() -> String {
    "thomasmol/whisper-diarization".to_string()
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl WorkflowConfig {
    /// Config with library defaults for everything but the paths.
    pub fn new(input_file: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_file: input_file.into(),
            output_dir: output_dir.into(),
            extract_audio: true,
            process_audio: true,
            transcribe: true,
            summarize: true,
            audio_format: AudioFormat::M4a,
            audio_quality: AudioQuality::High,
            increase_volume: false,
            volume_gain_db: default_volume_gain(),
            normalize_audio: true,
            output_formats: default_output_formats(),
            transcribe_model: default_transcribe_model(),
            language: default_language(),
            summary_template: SummaryTemplate::Default,
            provider: Provider::Openai,
            model: default_model(),
            auto_detect_template: true,
        }
    }

    /// Config seeded from process settings.
    ///
    /// Precedence is explicit: settings supply defaults here, at
    /// construction; fields set on the returned config always win and
    /// nothing reads ambient configuration later.
    pub fn from_settings(
        input_file: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        settings: &Settings,
    ) -> Self {
        Self {
            provider: settings.provider,
            model: settings.model.clone(),
            summary_template: settings.summary_template,
            auto_detect_template: settings.summary_auto_detect,
            transcribe_model: settings.transcribe_model.clone(),
            ..Self::new(input_file, output_dir)
        }
    }

    /// Check the step-gate invariants against the classified input.
    ///
    /// At least one gate must be enabled; transcription needs media (or
    /// audio produced by an earlier stage, which media inputs imply);
    /// summarization needs a transcript from somewhere.
    pub fn check_gates(&self, kind: InputKind) -> Result<(), ValidationError> {
        if !self.extract_audio && !self.process_audio && !self.transcribe && !self.summarize {
            return Err(ValidationError::NoStepsEnabled);
        }

        let is_media = matches!(kind, InputKind::Video | InputKind::Audio);
        if self.transcribe && !is_media && kind != InputKind::Transcript {
            return Err(ValidationError::GateConflict {
                message: "transcription requires a video or audio input".to_string(),
            });
        }
        if self.summarize && !self.transcribe && kind != InputKind::Transcript {
            return Err(ValidationError::GateConflict {
                message: "summarization requires transcription or a transcript input".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_all_gates() {
        let config = WorkflowConfig::new("in.mp4", "out");
        assert!(config.extract_audio && config.process_audio);
        assert!(config.transcribe && config.summarize);
        assert_eq!(config.audio_format, AudioFormat::M4a);
        assert_eq!(config.volume_gain_db, 10.0);
        assert_eq!(config.output_formats, vec![AudioFormat::M4a]);
        assert_eq!(config.language, "auto");
    }

    #[test]
    fn from_settings_seeds_summarization_defaults() {
        let settings = Settings {
            provider: Provider::Openai,
            model: "gpt-4o-mini".to_string(),
            summary_template: SummaryTemplate::Decision,
            summary_auto_detect: false,
            ..Settings::default()
        };
        let config = WorkflowConfig::from_settings("in.m4a", "out", &settings);
        assert_eq!(config.provider, Provider::Openai);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.summary_template, SummaryTemplate::Decision);
        assert!(!config.auto_detect_template);
    }

    #[test]
    fn gates_require_at_least_one_step() {
        let mut config = WorkflowConfig::new("in.mp4", "out");
        config.extract_audio = false;
        config.process_audio = false;
        config.transcribe = false;
        config.summarize = false;
        assert_eq!(
            config.check_gates(InputKind::Video),
            Err(ValidationError::NoStepsEnabled)
        );
    }

    #[test]
    fn summarize_without_transcribe_needs_transcript_input() {
        let mut config = WorkflowConfig::new("in.json", "out");
        config.extract_audio = false;
        config.process_audio = false;
        config.transcribe = false;

        assert!(config.check_gates(InputKind::Transcript).is_ok());
        assert!(matches!(
            config.check_gates(InputKind::Video),
            Err(ValidationError::GateConflict { .. })
        ));
    }

    #[test]
    fn media_inputs_pass_default_gates() {
        let config = WorkflowConfig::new("in.mp4", "out");
        assert!(config.check_gates(InputKind::Video).is_ok());
        assert!(config.check_gates(InputKind::Audio).is_ok());
        assert!(config.check_gates(InputKind::Transcript).is_ok());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: WorkflowConfig =
            serde_json::from_str(r#"{"input_file": "in.mp4", "output_dir": "out"}"#).unwrap();
        assert!(config.extract_audio);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.audio_quality, AudioQuality::High);
    }
}
