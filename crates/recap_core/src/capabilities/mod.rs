//! Contracts for the external subsystems the engine drives.
//!
//! The engine never talks to ffmpeg or a provider API directly; it
//! consumes these capabilities through trait objects, and adapters in
//! the surrounding application bridge to the real subsystems. Every
//! blocking operation takes the cancellation token explicitly; an
//! implementation that honors it unblocks promptly on cancel, one that
//! ignores it sets the latency floor for responsiveness.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::concurrency::CancellationToken;
use crate::models::{AudioFormat, AudioQuality, Provider, SummaryInfo, SummaryTemplate};
use crate::workflow::StageError;

/// Extracts the audio track from a video container.
pub trait AudioExtractor: Send + Sync {
    fn extract(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
        quality: AudioQuality,
        normalize: bool,
        token: &CancellationToken,
    ) -> Result<PathBuf, StageError>;
}

/// Conditions audio artifacts: gain, loudness, format, STT waveform.
pub trait AudioConditioner: Send + Sync {
    fn adjust_volume(
        &self,
        input: &Path,
        output: &Path,
        gain_db: f64,
        token: &CancellationToken,
    ) -> Result<PathBuf, StageError>;

    fn normalize_loudness(
        &self,
        input: &Path,
        output: &Path,
        token: &CancellationToken,
    ) -> Result<PathBuf, StageError>;

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
        quality: AudioQuality,
        token: &CancellationToken,
    ) -> Result<PathBuf, StageError>;

    /// Produce the canonical 16 kHz mono WAV the transcriber expects.
    fn ensure_wav_16k_mono(
        &self,
        input: &Path,
        token: &CancellationToken,
    ) -> Result<PathBuf, StageError>;
}

/// Speech-to-text with diarization.
///
/// The returned path is a transcript JSON artifact:
/// `[{start, end, text, speaker?, words?}]`.
pub trait Transcriber: Send + Sync {
    fn transcribe(
        &self,
        audio: &Path,
        model: &str,
        language: &str,
        output_dir: &Path,
        token: &CancellationToken,
    ) -> Result<PathBuf, StageError>;
}

/// LLM summarization over a transcript artifact.
pub trait Summarizer: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn summarize(
        &self,
        transcript: &Path,
        provider: Provider,
        model: &str,
        template: SummaryTemplate,
        auto_detect: bool,
        output_dir: &Path,
        token: &CancellationToken,
    ) -> Result<(PathBuf, SummaryInfo), StageError>;
}

/// Resolved credential lookup. Names follow the environment keys
/// (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `STT_API_TOKEN`).
pub trait CredentialStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// Credential store backed by the process environment, the production
/// default once the secret backend has resolved into env vars.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Bundle of capability objects handed to the engine.
#[derive(Clone)]
pub struct Capabilities {
    pub extractor: Arc<dyn AudioExtractor>,
    pub conditioner: Arc<dyn AudioConditioner>,
    pub transcriber: Arc<dyn Transcriber>,
    pub summarizer: Arc<dyn Summarizer>,
}
