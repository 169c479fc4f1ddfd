//! Error types for the workflow pipeline.
//!
//! Errors carry context that chains through layers:
//! Workflow → Step → Operation → Detail.
//!
//! Cancellation and shutdown are distinguished sentinels, never folded
//! into step context: callers must be able to tell "the user stopped
//! this" apart from "this broke".

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::concurrency::Cancelled;
use crate::models::TranscriptError;
use crate::shutdown::Interrupted;
use crate::validation::{InputError, ValidationError};

use super::step::StepName;

/// Error from a single workflow stage or capability call.
#[derive(Error, Debug)]
pub enum StageError {
    /// Input rejected before any work ran.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A referenced file was absent at operation time.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// I/O failure during read/write/copy/move.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Missing or malformed credential, unreachable tool binary.
    /// Surfaced at startup checks before any stage runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// ffmpeg non-zero exit or unparseable probe output.
    #[error("audio processing failed: {0}")]
    AudioProcessing(String),

    /// STT provider failure, upload rejection, or terminal poll state.
    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Summarization provider failure (auth, rate limit, network).
    #[error("{provider} provider error: {message}")]
    LlmProvider { provider: String, message: String },

    /// Parse failure (JSON, timestamps, transcripts).
    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    /// A stage precondition was not met.
    #[error("{0}")]
    Precondition(String),

    /// Cooperative cancellation observed.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// Process shutdown observed.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("{0}")]
    Other(String),
}

impl StageError {
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn audio_processing(message: impl Into<String>) -> Self {
        Self::AudioProcessing(message.into())
    }

    pub fn transcription(message: impl Into<String>) -> Self {
        Self::Transcription(message.into())
    }

    pub fn llm_provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn parse_error(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<InputError> for StageError {
    fn from(error: InputError) -> Self {
        match error {
            InputError::Validation(e) => StageError::Validation(e),
            InputError::FileNotFound { path } => StageError::FileNotFound { path },
            InputError::Io { operation, source } => StageError::Io { operation, source },
        }
    }
}

impl From<TranscriptError> for StageError {
    fn from(error: TranscriptError) -> Self {
        match error {
            TranscriptError::Io { operation, source } => StageError::Io { operation, source },
            TranscriptError::Parse { what, message } => StageError::Parse { what, message },
        }
    }
}

/// Top-level workflow error surfaced to the caller.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// A step failed during execution.
    #[error("workflow failed at step '{step}': {source}")]
    StepFailed {
        step: StepName,
        #[source]
        source: StageError,
    },

    /// Configuration or input rejected before the walk started.
    #[error("workflow validation failed: {source}")]
    Validation {
        #[source]
        source: StageError,
    },

    /// The run was cancelled via its token.
    #[error("workflow was cancelled")]
    Cancelled,

    /// Process shutdown interrupted the run.
    #[error("workflow interrupted by shutdown")]
    Interrupted,

    /// Setup failure (directories, job bookkeeping).
    #[error("workflow setup failed: {0}")]
    Setup(String),
}

impl WorkflowError {
    /// Wrap a stage error with its step name — except the cancellation
    /// and shutdown sentinels, which propagate undisturbed.
    pub fn from_step(step: StepName, source: StageError) -> Self {
        match source {
            StageError::Cancelled(_) => WorkflowError::Cancelled,
            StageError::Interrupted(_) => WorkflowError::Interrupted,
            source => WorkflowError::StepFailed { step, source },
        }
    }

    pub fn validation(source: impl Into<StageError>) -> Self {
        WorkflowError::Validation {
            source: source.into(),
        }
    }

    /// Whether this error represents caller-initiated termination
    /// rather than a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WorkflowError::Cancelled | WorkflowError::Interrupted)
    }
}

/// Result alias for stage operations.
pub type StepResult<T> = Result<T, StageError>;
