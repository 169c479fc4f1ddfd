//! Input validation and path safety checks.
//!
//! Everything here runs before any I/O on the validated path: a path
//! that fails these rules is rejected without touching the filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{InputKind, Provider, SummaryTemplate};

/// Windows MAX_PATH limit, applied on every platform for portability.
pub const MAX_PATH_LENGTH: usize = 260;

/// Default size cap for video/audio inputs, in megabytes.
pub const MAX_FILE_SIZE_MB: f64 = 500.0;

/// Closed allow-list of video extensions.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v"];

/// Closed allow-list of audio extensions.
pub const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mka", "ogg", "mp3", "wav", "webm", "flac"];

/// Closed allow-list of transcript extensions.
pub const TRANSCRIPT_EXTENSIONS: &[&str] = &["json", "txt", "srt"];

/// URL-encoded traversal spellings, matched case-insensitively.
const ENCODED_TRAVERSAL: &[&str] = &["..%2f", "..%5c", "%2e%2e%2f", "%252e%252e%252f"];

/// Windows reserved device basenames.
const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Raised when an input fails validation. Recoverable by the caller
/// adjusting inputs.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("path cannot be empty")]
    EmptyPath,

    #[error("path contains directory traversal patterns")]
    Traversal,

    #[error("path contains invalid characters")]
    InvalidCharacters,

    #[error("path uses a reserved name: {0}")]
    ReservedName(String),

    #[error("path too long (max {MAX_PATH_LENGTH} characters)")]
    PathTooLong,

    #[error("path is outside allowed directories: {}", path.display())]
    OutsideAllowedRoots { path: PathBuf },

    #[error("unsupported file format: .{extension}")]
    UnsupportedExtension { extension: String },

    #[error("input path is not a file: {}", path.display())]
    NotAFile { path: PathBuf },

    #[error("{kind} file too large: {size_mb:.1} MB (max {max_mb:.0} MB)")]
    FileTooLarge {
        kind: InputKind,
        size_mb: f64,
        max_mb: f64,
    },

    #[error("invalid provider '{0}' (expected one of: anthropic, openai)")]
    InvalidProvider(String),

    #[error("invalid template '{0}' (expected one of: brainstorm, decision, default, requirements, sop)")]
    InvalidTemplate(String),

    #[error("invalid model name: {0}")]
    InvalidModelName(String),

    #[error("no workflow steps enabled")]
    NoStepsEnabled,

    #[error("incompatible step gates: {message}")]
    GateConflict { message: String },
}

/// Raised when a validated input cannot be read.
#[derive(Error, Debug)]
pub enum InputError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("input file does not exist: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

/// Detect the input kind from the file extension.
///
/// `.webm` matches both video and audio; video wins, matching the
/// extraction-first pipeline order.
pub fn classify(path: &Path) -> InputKind {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        InputKind::Video
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        InputKind::Audio
    } else if TRANSCRIPT_EXTENSIONS.contains(&extension.as_str()) {
        InputKind::Transcript
    } else {
        InputKind::Unknown
    }
}

/// Validate that a path is safe: no traversal tokens, no control or
/// shell-hostile characters, no reserved basenames, bounded length,
/// and inside one of `allowed_roots` when that list is non-empty.
///
/// Returns the path in absolute form. Purely lexical; performs no I/O.
pub fn validate_safe_path(path: &Path, allowed_roots: &[PathBuf]) -> Result<PathBuf, ValidationError> {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    if trimmed.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::PathTooLong);
    }

    let lower = trimmed.to_ascii_lowercase();
    // Backslash variants matter even off-Windows: they are not path
    // separators here, so component analysis alone would miss them.
    let has_traversal = Path::new(trimmed)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
        || lower.contains("../")
        || lower.contains("..\\")
        || ENCODED_TRAVERSAL.iter().any(|p| lower.contains(p));
    if has_traversal {
        return Err(ValidationError::Traversal);
    }

    let has_control = trimmed
        .chars()
        .any(|c| c.is_control() || ('\u{7f}'..='\u{9f}').contains(&c));
    let has_invalid = trimmed.chars().any(|c| "<>\"|*?".contains(c));
    if has_control || has_invalid {
        return Err(ValidationError::InvalidCharacters);
    }

    if let Some(name) = Path::new(trimmed).file_name() {
        let stem = name
            .to_string_lossy()
            .split('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if RESERVED_NAMES.contains(&stem.as_str()) {
            return Err(ValidationError::ReservedName(stem));
        }
    }

    let absolute = if Path::new(trimmed).is_absolute() {
        PathBuf::from(trimmed)
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(trimmed))
            .unwrap_or_else(|_| PathBuf::from(trimmed))
    };

    if !allowed_roots.is_empty()
        && !allowed_roots.iter().any(|root| absolute.starts_with(root))
    {
        return Err(ValidationError::OutsideAllowedRoots { path: absolute });
    }

    Ok(absolute)
}

/// Enforce the size cap for video and audio inputs.
///
/// Transcripts are not size-gated here.
pub fn validate_file_size(path: &Path, max_mb: f64, kind: InputKind) -> Result<(), InputError> {
    if !matches!(kind, InputKind::Video | InputKind::Audio) {
        return Ok(());
    }

    let metadata = fs::metadata(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            InputError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            InputError::Io {
                operation: format!("reading metadata for {}", path.display()),
                source: e,
            }
        }
    })?;

    let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
    if size_mb > max_mb {
        return Err(ValidationError::FileTooLarge {
            kind,
            size_mb,
            max_mb,
        }
        .into());
    }

    tracing::debug!(
        "File size validation passed: {:.1} MB {} file",
        size_mb,
        kind
    );
    Ok(())
}

/// Validate an input file for workflow processing.
///
/// Composes path safety, existence, and kind classification; returns
/// the canonical path and the detected kind.
pub fn validate_workflow_input(path: &Path) -> Result<(PathBuf, InputKind), InputError> {
    let safe = validate_safe_path(path, &[])?;

    if !safe.exists() {
        return Err(InputError::FileNotFound { path: safe });
    }
    if !safe.is_file() {
        return Err(ValidationError::NotAFile { path: safe }.into());
    }

    let canonical = fs::canonicalize(&safe).map_err(|e| InputError::Io {
        operation: format!("canonicalizing {}", safe.display()),
        source: e,
    })?;

    let kind = classify(&canonical);
    if kind == InputKind::Unknown {
        let extension = canonical
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        return Err(ValidationError::UnsupportedExtension { extension }.into());
    }

    tracing::info!("Detected file type: {} for {}", kind, canonical.display());
    Ok((canonical, kind))
}

/// Validate an LLM provider name.
pub fn validate_provider(name: &str) -> Result<Provider, ValidationError> {
    Provider::parse(name).ok_or_else(|| ValidationError::InvalidProvider(name.to_string()))
}

/// Validate a summary template name.
pub fn validate_template(name: &str) -> Result<SummaryTemplate, ValidationError> {
    SummaryTemplate::parse(name).ok_or_else(|| ValidationError::InvalidTemplate(name.to_string()))
}

/// Validate a model identifier: letters, digits, `.`, `_`, `/`, `-`,
/// at most 100 characters.
pub fn validate_model_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    let well_formed = !trimmed.is_empty()
        && trimmed.len() <= 100
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._/-".contains(c));
    if well_formed {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidModelName(name.to_string()))
    }
}

/// Format check for OpenAI API keys (`sk-*`, `sk-proj-*`).
///
/// Shape only; never probes the network.
pub fn has_openai_key_shape(key: &str) -> bool {
    !key.starts_with("sk-ant-") && (key.starts_with("sk-proj-") || key.starts_with("sk-")) && key.len() >= 20
}

/// Format check for Anthropic API keys (`sk-ant-*`).
pub fn has_anthropic_key_shape(key: &str) -> bool {
    key.starts_with("sk-ant-") && key.len() >= 20
}

/// Format check for the STT provider token (`r8_*`).
pub fn has_stt_token_shape(key: &str) -> bool {
    key.starts_with("r8_") && key.len() >= 20
}
