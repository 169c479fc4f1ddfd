//! Main workflow execution engine.
//!
//! Composes the validator, step factory, and executor; owns the
//! inter-stage state (`current_audio_file`, `current_transcript`); and
//! dispatches the external capability calls. One engine runs one job,
//! sequentially, in its host thread — a worker pool may host several
//! engines in parallel, each in its own thread.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::capabilities::Capabilities;
use crate::concurrency::CancellationToken;
use crate::config::{strip_processing_suffixes, DataLayout};
use crate::jobs::JobStateManager;
use crate::models::{
    load_transcript, AudioFormat, AudioQuality, InputKind, Provider, SummaryTemplate,
    TranscriptData,
};
use crate::shutdown::{ShutdownManager, TempArena};

use super::config::WorkflowConfig;
use super::errors::{StageError, StepResult, WorkflowError};
use super::factory::{build_steps, filter_executable_steps};
use super::progress::ProgressCallback;
use super::result::{ProcessedAudio, StageResult};
use super::step::{StepName, StepSettings, WorkflowStep};
use super::validator::WorkflowValidator;
use super::executor::WorkflowExecutor;

/// Workflow execution engine.
///
/// Validation happens at construction: the input path is canonicalized
/// and classified, gates are checked, and the output directory is
/// created, so a constructed engine is ready to run.
pub struct WorkflowEngine {
    config: WorkflowConfig,
    file_type: InputKind,
    current_audio_file: Option<PathBuf>,
    current_transcript: Option<TranscriptData>,
    capabilities: Capabilities,
    layout: DataLayout,
    token: CancellationToken,
    job_state: Option<(JobStateManager, String)>,
    arena: Option<TempArena>,
}

impl WorkflowEngine {
    /// Build an engine with the default validator.
    pub fn new(
        config: WorkflowConfig,
        capabilities: Capabilities,
        layout: DataLayout,
    ) -> Result<Self, WorkflowError> {
        Self::with_validator(config, capabilities, layout, WorkflowValidator::default())
    }

    /// Build an engine with an injected validator (for testing and
    /// custom size caps).
    pub fn with_validator(
        mut config: WorkflowConfig,
        capabilities: Capabilities,
        layout: DataLayout,
        validator: WorkflowValidator,
    ) -> Result<Self, WorkflowError> {
        let (canonical, file_type) = validator
            .validate(&config)
            .map_err(WorkflowError::validation)?;
        config.input_file = canonical;

        Ok(Self {
            config,
            file_type,
            current_audio_file: None,
            current_transcript: None,
            capabilities,
            layout,
            token: CancellationToken::new(),
            job_state: None,
            arena: None,
        })
    }

    /// Share a caller-supplied cancellation token.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Attach live job-state tracking for this run.
    pub fn with_job_tracking(mut self, manager: JobStateManager, job_id: impl Into<String>) -> Self {
        self.job_state = Some((manager, job_id.into()));
        self
    }

    /// Track stage temp files with the process shutdown registry.
    ///
    /// Intermediate artifacts are registered before each capability
    /// call and released once the stage succeeds, so finished artifacts
    /// survive exit while half-written ones get cleaned up.
    pub fn with_shutdown(mut self, manager: ShutdownManager) -> Self {
        self.arena = Some(TempArena::new(manager));
        self
    }

    /// The token cancelling this run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Detected kind of the validated input.
    pub fn file_type(&self) -> InputKind {
        self.file_type
    }

    /// Audio artifact the next stage would consume, if any.
    pub fn current_audio_file(&self) -> Option<&Path> {
        self.current_audio_file.as_deref()
    }

    /// Transcript the summarize stage would consume, if any.
    pub fn current_transcript(&self) -> Option<&TranscriptData> {
        self.current_transcript.as_ref()
    }

    /// Execute the workflow pipeline.
    ///
    /// Returns the per-step result map keyed by step name. A failed
    /// stage terminates the walk; artifacts already on disk are never
    /// rolled back.
    pub fn execute(
        &mut self,
        progress: Option<&ProgressCallback>,
    ) -> Result<BTreeMap<StepName, StageResult>, WorkflowError> {
        tracing::info!(
            "Starting workflow execution for {} file: {}",
            self.file_type,
            self.config.input_file.display()
        );

        let steps = build_steps(&self.config);
        let executable = filter_executable_steps(steps, self.file_type);

        // Pre-execution setup by input kind.
        match self.file_type {
            InputKind::Audio => {
                self.current_audio_file = Some(self.config.input_file.clone());
            }
            InputKind::Transcript => {
                self.load_existing_transcript()
                    .map_err(|e| WorkflowError::Setup(e.to_string()))?;
            }
            _ => {}
        }

        if let Some((manager, job_id)) = &self.job_state {
            let mut fields = serde_json::Map::new();
            fields.insert(
                "input_file".to_string(),
                serde_json::Value::String(self.config.input_file.display().to_string()),
            );
            fields.insert(
                "file_type".to_string(),
                serde_json::Value::String(self.file_type.to_string()),
            );
            manager.start_job(job_id.clone(), fields);
        }

        tracing::info!(
            "Executing {} workflow steps: {:?}",
            executable.len(),
            executable.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
        );

        let executor = WorkflowExecutor::new(self.token.clone());
        let job_state = self.job_state.clone();
        let outcome = executor.execute_steps(&executable, progress, |step| {
            if let Some((manager, _)) = &job_state {
                let mut fields = serde_json::Map::new();
                fields.insert(
                    "stage".to_string(),
                    serde_json::Value::String(step.name.to_string()),
                );
                manager.update_state(fields);
            }
            self.run_step(step)
        });

        match outcome {
            Ok(results) => {
                if let Some((manager, _)) = &self.job_state {
                    manager.complete_job(serde_json::to_value(&results).ok());
                }
                tracing::info!("Workflow execution completed successfully");
                Ok(results)
            }
            Err(error) => {
                // Cancellation and shutdown are not failures: the state
                // file stays `running` (the shutdown hook marks it
                // `interrupted` at exit) and is never marked completed.
                if let Some((manager, _)) = &self.job_state {
                    if !error.is_cancellation() {
                        manager.fail_job(&error.to_string());
                    }
                }
                Err(error)
            }
        }
    }

    fn run_step(&mut self, step: &WorkflowStep) -> StepResult<StageResult> {
        match &step.settings {
            StepSettings::Extract { format, quality } => {
                self.extract_audio_step(*format, *quality)
            }
            StepSettings::Process {
                increase_volume,
                volume_gain_db,
                normalize_audio,
                output_formats,
            } => self.process_audio_step(
                *increase_volume,
                *volume_gain_db,
                *normalize_audio,
                output_formats,
            ),
            StepSettings::Transcribe { model, language } => self.transcribe_step(model, language),
            StepSettings::Summarize {
                template,
                provider,
                model,
                auto_detect,
            } => self.summarize_step(*template, *provider, model, *auto_detect),
        }
    }

    /// Extract the audio track from a video input.
    fn extract_audio_step(
        &mut self,
        format: AudioFormat,
        quality: AudioQuality,
    ) -> StepResult<StageResult> {
        if self.file_type != InputKind::Video {
            tracing::warn!("Skipping audio extraction - not a video file");
            return Ok(StageResult::skipped("Not a video file"));
        }

        self.token.check()?;

        let stem = file_stem(&self.config.input_file);
        let output_path = self
            .layout
            .audio_path(&format!("{}_extracted", stem), format);
        ensure_parent(&output_path)?;
        self.track_temp(&output_path);

        let extracted = self.capabilities.extractor.extract(
            &self.config.input_file,
            &output_path,
            format,
            quality,
            true,
            &self.token,
        )?;
        self.release_temp(&output_path);

        self.current_audio_file = Some(extracted.clone());
        tracing::info!("Audio extracted to {}", extracted.display());

        Ok(StageResult::Extract {
            input_file: self.config.input_file.clone(),
            output_file: extracted,
            format,
            quality,
        })
    }

    /// Condition the current audio: gain, loudness, side conversions.
    fn process_audio_step(
        &mut self,
        increase_volume: bool,
        volume_gain_db: f64,
        normalize_audio: bool,
        output_formats: &[AudioFormat],
    ) -> StepResult<StageResult> {
        if self.file_type == InputKind::Transcript {
            tracing::warn!("Skipping audio processing - transcript file");
            return Ok(StageResult::skipped("Transcript file"));
        }

        let Some(mut current) = self.current_audio_file.clone() else {
            return Err(StageError::precondition(
                "No audio file available for processing",
            ));
        };
        let input_file = current.clone();
        let base = strip_processing_suffixes(&file_stem(&current));
        let current_format = audio_format_of(&current, self.config.audio_format);
        let mut processed: Vec<ProcessedAudio> = Vec::new();

        if increase_volume {
            self.token.check()?;
            let output = self
                .layout
                .audio_path(&format!("{}_volume", base), current_format);
            ensure_parent(&output)?;
            self.track_temp(&output);
            let file = self.capabilities.conditioner.adjust_volume(
                &current,
                &output,
                volume_gain_db,
                &self.token,
            )?;
            self.release_temp(&output);
            processed.push(ProcessedAudio::VolumeAdjustment {
                file: file.clone(),
                gain_db: volume_gain_db,
            });
            current = file;
        }

        if normalize_audio {
            self.token.check()?;
            let output = self
                .layout
                .audio_path(&format!("{}_normalized", base), current_format);
            ensure_parent(&output)?;
            self.track_temp(&output);
            let file = self.capabilities.conditioner.normalize_loudness(
                &current,
                &output,
                &self.token,
            )?;
            self.release_temp(&output);
            processed.push(ProcessedAudio::Normalization { file: file.clone() });
            current = file;
        }

        // Requested formats become side outputs in the output
        // directory; they do not advance the chain.
        for &format in output_formats {
            if format != current_format {
                self.token.check()?;
                let output = self
                    .config
                    .output_dir
                    .join(format!("{}.{}", file_stem(&current), format.extension()));
                self.track_temp(&output);
                let file = self.capabilities.conditioner.convert(
                    &current,
                    &output,
                    format,
                    AudioQuality::Medium,
                    &self.token,
                )?;
                self.release_temp(&output);
                processed.push(ProcessedAudio::FormatConversion { file, format });
            }
        }

        self.current_audio_file = Some(current);
        Ok(StageResult::Process {
            input_file,
            processed_files: processed,
        })
    }

    /// Transcribe the current audio via the STT capability.
    fn transcribe_step(&mut self, model: &str, language: &str) -> StepResult<StageResult> {
        if self.file_type == InputKind::Transcript {
            tracing::warn!("Skipping transcription - already have transcript");
            return Ok(StageResult::skipped("Already have transcript"));
        }

        let Some(audio) = self.current_audio_file.clone() else {
            return Err(StageError::precondition(
                "No audio file available for transcription",
            ));
        };

        self.token.check()?;
        let transcription_audio = self
            .capabilities
            .conditioner
            .ensure_wav_16k_mono(&audio, &self.token)?;

        self.token.check()?;
        let transcript_file = self.capabilities.transcriber.transcribe(
            &transcription_audio,
            model,
            language,
            &self.config.output_dir,
            &self.token,
        )?;

        // Lightweight holder; segments are loaded lazily by summarize.
        self.current_transcript = Some(TranscriptData::lazy(transcript_file.clone()));

        Ok(StageResult::Transcribe {
            audio_file: transcription_audio,
            model: model.to_string(),
            language: language.to_string(),
            transcript_file,
        })
    }

    /// Summarize the current transcript via the LLM capability.
    fn summarize_step(
        &mut self,
        template: SummaryTemplate,
        provider: Provider,
        model: &str,
        auto_detect: bool,
    ) -> StepResult<StageResult> {
        if self.current_transcript.is_none() {
            if self.file_type == InputKind::Transcript {
                self.load_existing_transcript()?;
            } else {
                return Err(StageError::precondition(
                    "No transcript available for summarization",
                ));
            }
        }

        let transcript_file = self
            .current_transcript
            .as_ref()
            .and_then(|t| t.output_file.clone())
            .unwrap_or_else(|| self.config.input_file.clone());

        self.token.check()?;
        let (summary_file, _info) = self.capabilities.summarizer.summarize(
            &transcript_file,
            provider,
            model,
            template,
            auto_detect,
            &self.config.output_dir,
            &self.token,
        )?;

        Ok(StageResult::Summarize {
            transcript_file,
            provider,
            model: model.to_string(),
            template,
            summary_file,
        })
    }

    fn track_temp(&self, path: &Path) {
        if let Some(arena) = &self.arena {
            arena.register(path);
        }
    }

    fn release_temp(&self, path: &Path) {
        if let Some(arena) = &self.arena {
            arena.release(path);
        }
    }

    fn load_existing_transcript(&mut self) -> StepResult<()> {
        let data = load_transcript(&self.config.input_file)?;
        tracing::info!(
            "Loaded existing transcript from: {}",
            self.config.input_file.display()
        );
        self.current_transcript = Some(data);
        Ok(())
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string())
}

fn audio_format_of(path: &Path, fallback: AudioFormat) -> AudioFormat {
    path.extension()
        .and_then(|e| AudioFormat::parse(&e.to_string_lossy()))
        .unwrap_or(fallback)
}

fn ensure_parent(path: &Path) -> StepResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StageError::io_error(format!("creating {}", parent.display()), e))?;
    }
    Ok(())
}
