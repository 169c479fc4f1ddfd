//! Transcript model with JSON, text, SRT, and WebVTT support.
//!
//! The primary on-disk form is a JSON array of segments:
//! `[{start, end, text, speaker?, words?}]`. A wrapped object form
//! (`{"segments": [...], "duration": ...}`) is accepted on input.
//! SRT and WebVTT are accepted on input; SRT output is timecoded as
//! `HH:MM:SS,mmm --> HH:MM:SS,mmm` with speaker prefixes in brackets.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Individual word with timing information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Text segment with speaker attribution and optional word-level timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
}

impl Segment {
    /// Create a segment with no speaker or word timings.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            speaker: None,
            words: None,
        }
    }
}

/// Complete transcript with segments and metadata.
///
/// The engine often carries a lightweight holder whose segments are
/// loaded lazily from `output_file`; `duration` is zero until computed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptData {
    pub segments: Vec<Segment>,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

impl TranscriptData {
    /// Placeholder pointing at a transcript file whose segments have
    /// not been loaded yet.
    pub fn lazy(output_file: PathBuf) -> Self {
        Self {
            segments: Vec::new(),
            duration: 0.0,
            output_file: Some(output_file),
        }
    }

    /// End time of the last segment, or zero for an empty transcript.
    pub fn computed_duration(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }
}

/// Errors from transcript reading and writing.
#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },
}

impl TranscriptError {
    fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }
}

/// Load a transcript from JSON, plain text, SRT, or WebVTT.
///
/// Dispatches on the file extension; anything that is not `.json` or
/// `.srt` is treated as plain text and wrapped in a single segment with
/// speaker `UNKNOWN`.
pub fn load_transcript(path: &Path) -> Result<TranscriptData, TranscriptError> {
    let content = fs::read_to_string(path)
        .map_err(|e| TranscriptError::io(format!("reading {}", path.display()), e))?;

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let mut data = match extension.as_str() {
        "json" => parse_json_transcript(&content)?,
        "srt" | "vtt" => TranscriptData {
            segments: parse_srt_content(&content),
            duration: 0.0,
            output_file: None,
        },
        _ => TranscriptData {
            segments: vec![Segment {
                start: 0.0,
                end: 0.0,
                text: content,
                speaker: Some("UNKNOWN".to_string()),
                words: None,
            }],
            duration: 0.0,
            output_file: None,
        },
    };

    if data.duration == 0.0 {
        data.duration = data.computed_duration();
    }
    data.output_file = Some(path.to_path_buf());
    tracing::info!(
        "Loaded transcript with {} segments from {}",
        data.segments.len(),
        path.display()
    );
    Ok(data)
}

/// Parse JSON transcript content, accepting both the bare-array and
/// the `{"segments": [...]}` wrapped shapes.
fn parse_json_transcript(content: &str) -> Result<TranscriptData, TranscriptError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum JsonShape {
        Bare(Vec<Segment>),
        Wrapped {
            segments: Vec<Segment>,
            #[serde(default)]
            duration: f64,
        },
    }

    match serde_json::from_str::<JsonShape>(content) {
        Ok(JsonShape::Bare(segments)) => Ok(TranscriptData {
            segments,
            duration: 0.0,
            output_file: None,
        }),
        Ok(JsonShape::Wrapped { segments, duration }) => Ok(TranscriptData {
            segments,
            duration,
            output_file: None,
        }),
        Err(e) => Err(TranscriptError::parse("JSON transcript", e.to_string())),
    }
}

/// Save segments as a JSON transcript (bare-array form).
pub fn save_json_transcript(data: &TranscriptData, path: &Path) -> Result<(), TranscriptError> {
    let json = serde_json::to_string_pretty(&data.segments)
        .map_err(|e| TranscriptError::parse("JSON transcript", e.to_string()))?;
    fs::write(path, json)
        .map_err(|e| TranscriptError::io(format!("writing {}", path.display()), e))?;
    tracing::debug!("Saved JSON transcript: {}", path.display());
    Ok(())
}

/// Save segments as a readable text transcript: `[MM:SS] Speaker: text`.
pub fn save_text_transcript(data: &TranscriptData, path: &Path) -> Result<(), TranscriptError> {
    let lines: Vec<String> = data
        .segments
        .iter()
        .map(|s| {
            let speaker = s.speaker.as_deref().unwrap_or("Unknown");
            format!("[{}] {}: {}", format_timestamp(s.start), speaker, s.text)
        })
        .collect();
    fs::write(path, lines.join("\n"))
        .map_err(|e| TranscriptError::io(format!("writing {}", path.display()), e))?;
    tracing::debug!("Saved text transcript: {}", path.display());
    Ok(())
}

/// Save segments as an SRT subtitle file with bracketed speaker prefixes.
pub fn save_srt_transcript(data: &TranscriptData, path: &Path) -> Result<(), TranscriptError> {
    let mut lines: Vec<String> = Vec::with_capacity(data.segments.len() * 4);
    for (i, segment) in data.segments.iter().enumerate() {
        let speaker_prefix = segment
            .speaker
            .as_deref()
            .map(|s| format!("[{}] ", s))
            .unwrap_or_default();
        lines.push((i + 1).to_string());
        lines.push(format!(
            "{} --> {}",
            format_srt_timestamp(segment.start),
            format_srt_timestamp(segment.end)
        ));
        lines.push(format!("{}{}", speaker_prefix, segment.text));
        lines.push(String::new());
    }
    fs::write(path, lines.join("\n"))
        .map_err(|e| TranscriptError::io(format!("writing {}", path.display()), e))?;
    tracing::debug!("Saved SRT transcript: {}", path.display());
    Ok(())
}

/// Parse SRT or WebVTT content into segments.
///
/// Malformed cues are skipped with a warning rather than failing the
/// whole file.
fn parse_srt_content(content: &str) -> Vec<Segment> {
    let is_webvtt = content.trim_start().starts_with("WEBVTT");
    let segments = if is_webvtt {
        parse_webvtt(content)
    } else {
        parse_srt(content)
    };
    tracing::info!(
        "Parsed {} segments from {} content",
        segments.len(),
        if is_webvtt { "WebVTT" } else { "SRT" }
    );
    segments
}

fn parse_srt(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();

    for block in content.trim().split("\n\n") {
        let lines: Vec<&str> = block.trim().lines().collect();
        if lines.len() < 3 {
            continue;
        }

        // Line 0 is the cue index; line 1 the timecode; the rest is text.
        let Some((start, end)) = parse_timecode_line(lines[1]) else {
            tracing::warn!("Failed to parse SRT timecode: {}", lines[1]);
            continue;
        };

        let text = lines[2..].join(" ");
        let (speaker, text) = split_bracket_speaker(&text);
        if text.is_empty() {
            continue;
        }

        segments.push(Segment {
            start,
            end,
            text,
            speaker,
            words: None,
        });
    }

    segments
}

fn parse_webvtt(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let lines: Vec<&str> = content.trim().lines().collect();
    let mut i = 0;

    // Skip the WEBVTT header and any leading blank lines.
    while i < lines.len() && (lines[i].starts_with("WEBVTT") || lines[i].trim().is_empty()) {
        i += 1;
    }

    while i < lines.len() {
        if lines[i].contains("-->") {
            let Some((start, end)) = parse_timecode_line(lines[i]) else {
                tracing::warn!("Failed to parse WebVTT timecode: {}", lines[i]);
                i += 1;
                continue;
            };

            i += 1;
            let mut text_parts = Vec::new();
            while i < lines.len() && !lines[i].trim().is_empty() && !lines[i].contains("-->") {
                text_parts.push(lines[i].trim());
                i += 1;
            }

            let text = text_parts.join(" ");
            let (speaker, text) = split_cue_speaker(&text);
            if !text.is_empty() {
                segments.push(Segment {
                    start,
                    end,
                    text,
                    speaker,
                    words: None,
                });
            }
        } else {
            i += 1;
        }
    }

    segments
}

/// Parse a `start --> end` timecode line into seconds.
fn parse_timecode_line(line: &str) -> Option<(f64, f64)> {
    let (start_str, end_str) = line.split_once("-->")?;
    let start = parse_srt_timestamp(start_str.trim())?;
    let end = parse_srt_timestamp(end_str.trim())?;
    Some((start, end))
}

/// Extract a `[Name] text` speaker prefix, if present.
fn split_bracket_speaker(text: &str) -> (Option<String>, String) {
    if let Some(rest) = text.strip_prefix('[') {
        if let Some(close) = rest.find(']') {
            let speaker = rest[..close].to_string();
            let body = rest[close + 1..].trim().to_string();
            return (Some(speaker), body);
        }
    }
    (None, text.to_string())
}

/// Extract a speaker from a WebVTT cue: `[Name] text` or `Name: text`.
///
/// Colon-prefixed speaker names are only recognized when short, to avoid
/// misreading sentences that happen to contain a colon.
fn split_cue_speaker(text: &str) -> (Option<String>, String) {
    let (bracket_speaker, body) = split_bracket_speaker(text);
    if bracket_speaker.is_some() {
        return (bracket_speaker, body);
    }
    if let Some(colon) = text.find(':') {
        if colon < 30 {
            let speaker = text[..colon].trim().to_string();
            let body = text[colon + 1..].trim().to_string();
            return (Some(speaker), body);
        }
    }
    (None, text.to_string())
}

/// Format seconds as an `MM:SS` timestamp.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Format seconds as an SRT timestamp (`HH:MM:SS,mmm`).
pub fn format_srt_timestamp(seconds: f64) -> String {
    let clamped = seconds.max(0.0);
    let total = clamped as u64;
    let millis = ((clamped - total as f64) * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total / 3600,
        (total % 3600) / 60,
        total % 60,
        millis.min(999)
    )
}

/// Parse an SRT timestamp (`HH:MM:SS,mmm` or `HH:MM:SS.mmm`) to seconds.
pub fn parse_srt_timestamp(timestamp: &str) -> Option<f64> {
    let normalized = timestamp.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let mins: f64 = parts[1].parse().ok()?;
    let secs: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + mins * 60.0 + secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SRT_SAMPLE: &str = "1\n00:00:00,000 --> 00:00:02,500\n[Alice] Hello everyone\n\n2\n00:00:02,500 --> 00:00:05,000\n[Bob] Hi Alice\n";

    const VTT_SAMPLE: &str =
        "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\nAlice: Morning\n\n00:00:02.000 --> 00:00:04.000\nquick sync today\n";

    #[test]
    fn json_bare_array_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meeting.json");
        let data = TranscriptData {
            segments: vec![Segment::new(0.0, 1.0, "hello")],
            duration: 1.0,
            output_file: None,
        };
        save_json_transcript(&data, &path).unwrap();

        let loaded = load_transcript(&path).unwrap();
        assert_eq!(loaded.segments, data.segments);
        assert_eq!(loaded.duration, 1.0);
    }

    #[test]
    fn json_wrapped_shape_accepted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wrapped.json");
        fs::write(
            &path,
            r#"{"segments": [{"start": 0.0, "end": 2.0, "text": "hi"}], "duration": 2.0}"#,
        )
        .unwrap();

        let loaded = load_transcript(&path).unwrap();
        assert_eq!(loaded.segments.len(), 1);
        assert_eq!(loaded.duration, 2.0);
    }

    #[test]
    fn text_file_wraps_single_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "raw meeting notes").unwrap();

        let loaded = load_transcript(&path).unwrap();
        assert_eq!(loaded.segments.len(), 1);
        assert_eq!(loaded.segments[0].text, "raw meeting notes");
        assert_eq!(loaded.segments[0].speaker.as_deref(), Some("UNKNOWN"));
    }

    #[test]
    fn srt_parses_speakers_and_times() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meeting.srt");
        fs::write(&path, SRT_SAMPLE).unwrap();

        let loaded = load_transcript(&path).unwrap();
        assert_eq!(loaded.segments.len(), 2);
        assert_eq!(loaded.segments[0].speaker.as_deref(), Some("Alice"));
        assert_eq!(loaded.segments[0].text, "Hello everyone");
        assert_eq!(loaded.segments[0].start, 0.0);
        assert_eq!(loaded.segments[0].end, 2.5);
        assert_eq!(loaded.duration, 5.0);
    }

    #[test]
    fn webvtt_parses_colon_speakers() {
        let segments = parse_srt_content(VTT_SAMPLE);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].speaker.as_deref(), Some("Alice"));
        assert_eq!(segments[0].text, "Morning");
        assert!(segments[1].speaker.is_none());
    }

    #[test]
    fn malformed_srt_blocks_are_skipped() {
        let content = "garbage\n\n1\n00:00:00,000 --> 00:00:01,000\nvalid\n";
        let segments = parse_srt_content(content);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "valid");
    }

    #[test]
    fn srt_writer_emits_timecodes_and_speakers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.srt");
        let data = TranscriptData {
            segments: vec![Segment {
                start: 61.25,
                end: 63.5,
                text: "next item".to_string(),
                speaker: Some("Carol".to_string()),
                words: None,
            }],
            duration: 63.5,
            output_file: None,
        };
        save_srt_transcript(&data, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("00:01:01,250 --> 00:01:03,500"));
        assert!(content.contains("[Carol] next item"));
    }

    #[test]
    fn text_writer_formats_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let data = TranscriptData {
            segments: vec![Segment {
                start: 75.0,
                end: 80.0,
                text: "wrap up".to_string(),
                speaker: Some("Dan".to_string()),
                words: None,
            }],
            duration: 80.0,
            output_file: None,
        };
        save_text_transcript(&data, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[01:15] Dan: wrap up");
    }

    #[test]
    fn timestamp_parsing_handles_both_separators() {
        assert_eq!(parse_srt_timestamp("00:00:01,500"), Some(1.5));
        assert_eq!(parse_srt_timestamp("01:00:00.000"), Some(3600.0));
        assert_eq!(parse_srt_timestamp("bogus"), None);
    }
}
