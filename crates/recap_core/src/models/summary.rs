//! Summary metadata record.
//!
//! Produced by summarizer capability implementations alongside the
//! summary file; the JSON form of the `.summary.json` artifact.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::enums::{Provider, SummaryTemplate};

/// Metadata describing one produced summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryInfo {
    /// Transcript file the summary was derived from.
    pub transcript: PathBuf,
    pub provider: Provider,
    pub model: String,
    /// Chunking window used when splitting long transcripts, in seconds.
    pub chunk_seconds: u32,
    /// Chain-of-density refinement passes performed.
    pub cod_passes: u32,
    pub template: SummaryTemplate,
    /// Human-readable template name.
    pub template_name: String,
    /// Whether the template was auto-detected from transcript content.
    pub auto_detected: bool,
    /// RFC 3339 creation timestamp.
    pub timestamp: String,
    /// The summary body.
    pub summary: String,
}

impl SummaryInfo {
    /// Render the markdown form: a header block followed by the body.
    pub fn to_markdown(&self) -> String {
        format!(
            "# Meeting Summary\n\n\
             - **Template**: {}\n\
             - **Provider**: {} ({})\n\
             - **Generated**: {}\n\
             - **Source**: {}\n\n\
             ---\n\n\
             {}\n",
            self.template_name,
            self.provider,
            self.model,
            self.timestamp,
            self.transcript.display(),
            self.summary
        )
    }
}
