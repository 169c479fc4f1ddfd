//! Typed per-step results.
//!
//! The serialized forms match the documented JSON shapes: a skipped
//! step is `{"skipped": true, "reason": ...}`, every other variant is a
//! flat map of its fields.

use std::path::PathBuf;

use serde::Serialize;

use crate::models::{AudioFormat, AudioQuality, Provider, SummaryTemplate};

/// One processed-audio chain entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessedAudio {
    VolumeAdjustment { file: PathBuf, gain_db: f64 },
    Normalization { file: PathBuf },
    FormatConversion { file: PathBuf, format: AudioFormat },
}

impl ProcessedAudio {
    pub fn file(&self) -> &PathBuf {
        match self {
            ProcessedAudio::VolumeAdjustment { file, .. } => file,
            ProcessedAudio::Normalization { file } => file,
            ProcessedAudio::FormatConversion { file, .. } => file,
        }
    }
}

/// Output of one workflow step, keyed by step name in the engine's
/// final result map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageResult {
    Skipped {
        skipped: bool,
        reason: String,
    },
    Extract {
        input_file: PathBuf,
        output_file: PathBuf,
        format: AudioFormat,
        quality: AudioQuality,
    },
    Process {
        input_file: PathBuf,
        processed_files: Vec<ProcessedAudio>,
    },
    Transcribe {
        audio_file: PathBuf,
        model: String,
        language: String,
        transcript_file: PathBuf,
    },
    Summarize {
        transcript_file: PathBuf,
        provider: Provider,
        model: String,
        template: SummaryTemplate,
        summary_file: PathBuf,
    },
}

impl StageResult {
    /// Marker for a step gated out at runtime.
    pub fn skipped(reason: impl Into<String>) -> Self {
        StageResult::Skipped {
            skipped: true,
            reason: reason.into(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageResult::Skipped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_serializes_with_marker() {
        let json = serde_json::to_value(StageResult::skipped("Not a video file")).unwrap();
        assert_eq!(json["skipped"], true);
        assert_eq!(json["reason"], "Not a video file");
    }

    #[test]
    fn extract_serializes_flat() {
        let result = StageResult::Extract {
            input_file: PathBuf::from("/in/call.mp4"),
            output_file: PathBuf::from("/data/audio/call/call_extracted.m4a"),
            format: AudioFormat::M4a,
            quality: AudioQuality::High,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["format"], "m4a");
        assert_eq!(json["quality"], "high");
        assert!(json.get("skipped").is_none());
    }

    #[test]
    fn processed_audio_carries_type_tag() {
        let entry = ProcessedAudio::VolumeAdjustment {
            file: PathBuf::from("/a/call_volume.m4a"),
            gain_db: 10.0,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "volume_adjustment");
        assert_eq!(json["gain_db"], 10.0);

        let entry = ProcessedAudio::Normalization {
            file: PathBuf::from("/a/call_normalized.m4a"),
        };
        assert_eq!(serde_json::to_value(&entry).unwrap()["type"], "normalization");
    }
}
