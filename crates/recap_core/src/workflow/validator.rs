//! Pre-execution validation of a workflow config.

use std::fs;
use std::path::PathBuf;

use crate::models::InputKind;
use crate::validation::{validate_file_size, validate_workflow_input, MAX_FILE_SIZE_MB};

use super::config::WorkflowConfig;
use super::errors::{StageError, StepResult};

/// Validates workflow configuration before execution: input safety,
/// kind detection, size cap for media, gate coherence, and output
/// directory creation.
#[derive(Debug, Clone)]
pub struct WorkflowValidator {
    max_file_size_mb: f64,
}

impl WorkflowValidator {
    pub fn new(max_file_size_mb: f64) -> Self {
        Self { max_file_size_mb }
    }

    /// Validate and return the canonical input path and detected kind.
    pub fn validate(&self, config: &WorkflowConfig) -> StepResult<(PathBuf, InputKind)> {
        let (canonical, kind) = validate_workflow_input(&config.input_file)?;

        // Size gate applies to media inputs only; transcripts are small.
        validate_file_size(&canonical, self.max_file_size_mb, kind)?;

        config.check_gates(kind)?;

        fs::create_dir_all(&config.output_dir).map_err(|e| {
            StageError::io_error(
                format!("creating output directory {}", config.output_dir.display()),
                e,
            )
        })?;

        Ok((canonical, kind))
    }
}

impl Default for WorkflowValidator {
    fn default() -> Self {
        Self::new(MAX_FILE_SIZE_MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;
    use tempfile::tempdir;

    #[test]
    fn validate_creates_output_dir_and_classifies() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("meeting.m4a");
        fs::write(&input, b"audio").unwrap();
        let output_dir = dir.path().join("nested").join("out");

        let config = WorkflowConfig::new(&input, &output_dir);
        let (canonical, kind) = WorkflowValidator::default().validate(&config).unwrap();

        assert_eq!(kind, InputKind::Audio);
        assert!(canonical.is_absolute());
        assert!(output_dir.is_dir());
    }

    #[test]
    fn missing_input_is_file_not_found() {
        let dir = tempdir().unwrap();
        let config = WorkflowConfig::new(dir.path().join("absent.mp4"), dir.path().join("out"));
        let err = WorkflowValidator::default().validate(&config).unwrap_err();
        assert!(matches!(err, StageError::FileNotFound { .. }));
    }

    #[test]
    fn oversized_media_rejected_before_any_stage() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("big.m4a");
        fs::write(&input, vec![0u8; 3 * 1024 * 1024]).unwrap();
        let output_dir = dir.path().join("out");

        let config = WorkflowConfig::new(&input, &output_dir);
        let err = WorkflowValidator::new(2.0).validate(&config).unwrap_err();
        assert!(matches!(
            err,
            StageError::Validation(ValidationError::FileTooLarge { .. })
        ));
        // Rejected before output-directory creation.
        assert!(!output_dir.exists());
    }

    #[test]
    fn gate_conflicts_surface_as_validation_errors() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("call.mp4");
        fs::write(&input, b"video").unwrap();

        let mut config = WorkflowConfig::new(&input, dir.path().join("out"));
        config.extract_audio = false;
        config.process_audio = false;
        config.transcribe = false;
        config.summarize = false;

        let err = WorkflowValidator::default().validate(&config).unwrap_err();
        assert!(matches!(
            err,
            StageError::Validation(ValidationError::NoStepsEnabled)
        ));
    }
}
