//! On-disk data layout for pipeline artifacts.
//!
//! All persistent state lives under one base directory (default
//! `data/`):
//!
//! ```text
//! data/
//!     ├── video/                    source files (user-managed)
//!     ├── audio/{stem}/             intermediate audio artifacts
//!     ├── transcript/{stem}/        primary transcript + siblings
//!     ├── summary/{stem}/{template}/ per-template summaries
//!     ├── temp/                     scratch, cleaned at shutdown
//!     └── jobs/                     history records and state files
//! ```
//!
//! The `{stem}` grouping key is the input basename stripped of the
//! known processing suffixes, so `call_extracted` and `call_normalized`
//! land next to the artifacts of `call`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::models::{AudioFormat, SummaryTemplate};

/// Suffixes appended by pipeline stages, stripped when grouping.
const PROCESSING_SUFFIXES: &[&str] = &["_extracted", "_volume", "_normalized"];

/// Resolver for artifact paths under the data tree.
#[derive(Debug, Clone)]
pub struct DataLayout {
    base: PathBuf,
}

impl DataLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn video_dir(&self) -> PathBuf {
        self.base.join("video")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.base.join("audio")
    }

    pub fn transcript_dir(&self) -> PathBuf {
        self.base.join("transcript")
    }

    pub fn summary_dir(&self) -> PathBuf {
        self.base.join("summary")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.base.join("temp")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.base.join("jobs")
    }

    /// Path for an audio artifact: `audio/{group}/{stem}.{format}`.
    pub fn audio_path(&self, stem: &str, format: AudioFormat) -> PathBuf {
        self.audio_dir()
            .join(strip_processing_suffixes(stem))
            .join(format!("{}.{}", stem, format.extension()))
    }

    /// Subdirectory holding transcripts for an input stem.
    pub fn transcript_subdir(&self, stem: &str) -> PathBuf {
        self.transcript_dir().join(strip_processing_suffixes(stem))
    }

    /// Primary transcript path: `transcript/{group}/{group}.json`.
    pub fn transcript_path(&self, stem: &str) -> PathBuf {
        let group = strip_processing_suffixes(stem);
        self.transcript_subdir(stem).join(format!("{}.json", group))
    }

    /// Summary path: `summary/{group}/{template}/{group}.summary.{ext}`.
    pub fn summary_path(&self, stem: &str, template: SummaryTemplate, ext: &str) -> PathBuf {
        let group = strip_processing_suffixes(stem);
        self.summary_dir()
            .join(&group)
            .join(template.as_str())
            .join(format!("{}.summary.{}", group, ext))
    }

    /// Create the full directory tree.
    pub fn ensure_tree(&self) -> io::Result<()> {
        for dir in [
            self.video_dir(),
            self.audio_dir(),
            self.transcript_dir(),
            self.summary_dir(),
            self.temp_dir(),
            self.jobs_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("data")
    }
}

/// Strip trailing processing suffixes from a stem, repeatedly, so
/// chained artifacts (`call_extracted_normalized`) group under the
/// original input name.
pub fn strip_processing_suffixes(stem: &str) -> String {
    let mut current = stem;
    loop {
        let mut stripped = false;
        for suffix in PROCESSING_SUFFIXES {
            if let Some(rest) = current.strip_suffix(suffix) {
                if !rest.is_empty() {
                    current = rest;
                    stripped = true;
                }
            }
        }
        if !stripped {
            return current.to_string();
        }
    }
}
