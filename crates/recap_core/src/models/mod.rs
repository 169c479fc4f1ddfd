//! Core data models shared across the workflow engine.

mod enums;
mod summary;
mod transcript;

pub use enums::{AudioFormat, AudioQuality, InputKind, JobStatus, Provider, SummaryTemplate};
pub use summary::SummaryInfo;
pub use transcript::{
    format_srt_timestamp, format_timestamp, load_transcript, parse_srt_timestamp,
    save_json_transcript, save_srt_transcript, save_text_transcript, Segment, TranscriptData,
    TranscriptError, Word,
};
