//! Core enums used throughout the application.

use serde::{Deserialize, Serialize};

/// Kind of workflow input, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Video,
    Audio,
    Transcript,
    Unknown,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::Video => write!(f, "video"),
            InputKind::Audio => write!(f, "audio"),
            InputKind::Transcript => write!(f, "transcript"),
            InputKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Audio container format for extraction and conversion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    M4a,
    Mp3,
    Wav,
    Flac,
}

impl AudioFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::M4a => "m4a",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
        }
    }

    /// Parse a format tag such as "m4a" or "flac".
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "m4a" => Some(AudioFormat::M4a),
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Encoding quality tier for audio extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl std::fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioQuality::Low => write!(f, "low"),
            AudioQuality::Medium => write!(f, "medium"),
            AudioQuality::High => write!(f, "high"),
        }
    }
}

/// LLM provider for summarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Openai,
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Anthropic => "anthropic",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::Openai),
            "anthropic" => Some(Provider::Anthropic),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary shape selector. Selected directly or auto-detected from
/// transcript content by the summarizer capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryTemplate {
    #[default]
    Default,
    Sop,
    Decision,
    Brainstorm,
    Requirements,
}

impl SummaryTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryTemplate::Default => "default",
            SummaryTemplate::Sop => "sop",
            SummaryTemplate::Decision => "decision",
            SummaryTemplate::Brainstorm => "brainstorm",
            SummaryTemplate::Requirements => "requirements",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Some(SummaryTemplate::Default),
            "sop" => Some(SummaryTemplate::Sop),
            "decision" => Some(SummaryTemplate::Decision),
            "brainstorm" => Some(SummaryTemplate::Brainstorm),
            "requirements" => Some(SummaryTemplate::Requirements),
            _ => None,
        }
    }
}

impl std::fmt::Display for SummaryTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a job in the durable history store.
///
/// `Interrupted` means the owning process received a shutdown signal
/// before normal completion; distinguishable on disk from `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Started,
    Completed,
    Failed,
    Interrupted,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Started => write!(f, "started"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_kind_serializes_lowercase() {
        let json = serde_json::to_string(&InputKind::Transcript).unwrap();
        assert_eq!(json, "\"transcript\"");
    }

    #[test]
    fn audio_format_round_trips_tags() {
        for tag in ["m4a", "mp3", "wav", "flac"] {
            let fmt = AudioFormat::parse(tag).unwrap();
            assert_eq!(fmt.extension(), tag);
        }
        assert!(AudioFormat::parse("ogg").is_none());
    }

    #[test]
    fn provider_parse_is_case_insensitive() {
        assert_eq!(Provider::parse("OpenAI"), Some(Provider::Openai));
        assert_eq!(Provider::parse(" anthropic "), Some(Provider::Anthropic));
        assert!(Provider::parse("replicate").is_none());
    }

    #[test]
    fn template_parse_covers_all_variants() {
        for name in ["default", "sop", "decision", "brainstorm", "requirements"] {
            let template = SummaryTemplate::parse(name).unwrap();
            assert_eq!(template.as_str(), name);
        }
    }

    #[test]
    fn job_status_serializes_lowercase() {
        let json = serde_json::to_string(&JobStatus::Interrupted).unwrap();
        assert_eq!(json, "\"interrupted\"");
    }
}
