//! Application settings resolved from the environment.
//!
//! Settings come from process environment variables, optionally
//! preloaded from a `.env` file. Every field has a default; malformed
//! values fall back to the default with a warning rather than failing
//! startup.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::logging::mask_api_key;
use crate::models::{Provider, SummaryTemplate};

/// Deployment environment, controlling console log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" => Some(Environment::Development),
            "production" => Some(Environment::Production),
            _ => None,
        }
    }
}

/// Application settings loaded from environment variables.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    // LLM configuration
    pub provider: Provider,
    pub model: String,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub anthropic_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub stt_api_token: Option<String>,

    // Summarization defaults
    pub summary_max_tokens: u32,
    pub summary_chunk_seconds: u32,
    pub summary_cod_passes: u32,
    pub summary_template: SummaryTemplate,
    pub summary_auto_detect: bool,

    // Transcription defaults
    pub transcribe_model: String,
    pub max_upload_mb: f64,

    // Audio encoding bitrates per quality tier
    pub audio_high_bitrate: String,
    pub audio_medium_bitrate: String,
    pub audio_low_bitrate: String,

    // Data organization
    pub data_dir: PathBuf,

    // Job management
    pub max_concurrent_jobs: usize,
    pub job_history_days: u32,
    pub temp_cleanup_hours: u32,

    // Environment
    pub environment: Environment,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: "claude-3-5-sonnet-20241022".to_string(),
            openai_api_key: None,
            anthropic_api_key: None,
            stt_api_token: None,
            summary_max_tokens: 3000,
            summary_chunk_seconds: 1800,
            summary_cod_passes: 2,
            summary_template: SummaryTemplate::Default,
            summary_auto_detect: true,
            transcribe_model: "thomasmol/whisper-diarization".to_string(),
            max_upload_mb: 24.0,
            audio_high_bitrate: "192k".to_string(),
            audio_medium_bitrate: "128k".to_string(),
            audio_low_bitrate: "64k".to_string(),
            data_dir: PathBuf::from("data"),
            max_concurrent_jobs: 3,
            job_history_days: 30,
            temp_cleanup_hours: 24,
            environment: Environment::Development,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings, preloading a `.env` file if one is present.
    pub fn load() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_env()
    }

    /// Resolve settings from the current process environment.
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Self {
            provider: env_with("LLM_PROVIDER", defaults.provider, Provider::parse),
            model: env_string("LLM_MODEL", &defaults.model),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            stt_api_token: env_opt("STT_API_TOKEN"),
            summary_max_tokens: env_parse("SUMMARY_MAX_OUTPUT_TOKENS", defaults.summary_max_tokens),
            summary_chunk_seconds: env_parse("SUMMARY_CHUNK_SECONDS", defaults.summary_chunk_seconds),
            summary_cod_passes: env_parse("SUMMARY_COD_PASSES", defaults.summary_cod_passes),
            summary_template: env_with(
                "SUMMARY_TEMPLATE",
                defaults.summary_template,
                SummaryTemplate::parse,
            ),
            summary_auto_detect: env_bool("SUMMARY_AUTO_DETECT_TEMPLATE", defaults.summary_auto_detect),
            transcribe_model: env_string("TRANSCRIBE_MODEL", &defaults.transcribe_model),
            max_upload_mb: env_parse("MAX_UPLOAD_MB", defaults.max_upload_mb),
            audio_high_bitrate: env_string("AUDIO_HIGH_BITRATE", &defaults.audio_high_bitrate),
            audio_medium_bitrate: env_string("AUDIO_MEDIUM_BITRATE", &defaults.audio_medium_bitrate),
            audio_low_bitrate: env_string("AUDIO_LOW_BITRATE", &defaults.audio_low_bitrate),
            data_dir: env_opt("RECAP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs),
            job_history_days: env_parse("JOB_HISTORY_DAYS", defaults.job_history_days),
            temp_cleanup_hours: env_parse("TEMP_CLEANUP_HOURS", defaults.temp_cleanup_hours),
            environment: env_with("ENVIRONMENT", defaults.environment, Environment::parse),
            log_level: env_string("LOG_LEVEL", &defaults.log_level),
        }
    }

    /// Whether the process runs in production mode.
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// API key for the given provider, if configured.
    pub fn api_key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Openai => self.openai_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }

    /// Display summary of the configuration with credentials masked.
    pub fn summary(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("provider".to_string(), self.provider.to_string());
        map.insert("model".to_string(), self.model.clone());
        map.insert("data_dir".to_string(), self.data_dir.display().to_string());
        map.insert(
            "transcribe_model".to_string(),
            self.transcribe_model.clone(),
        );
        map.insert(
            "summary_template".to_string(),
            self.summary_template.to_string(),
        );
        map.insert(
            "summary_chunk_seconds".to_string(),
            self.summary_chunk_seconds.to_string(),
        );
        map.insert(
            "summary_cod_passes".to_string(),
            self.summary_cod_passes.to_string(),
        );
        map.insert(
            "max_concurrent_jobs".to_string(),
            self.max_concurrent_jobs.to_string(),
        );
        map.insert(
            "openai_api_key".to_string(),
            mask_api_key(self.openai_api_key.as_deref()),
        );
        map.insert(
            "anthropic_api_key".to_string(),
            mask_api_key(self.anthropic_api_key.as_deref()),
        );
        map.insert(
            "stt_api_token".to_string(),
            mask_api_key(self.stt_api_token.as_deref()),
        );
        map
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_string(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env_opt(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: {:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}

fn env_with<T: Copy>(key: &str, default: T, parse: impl Fn(&str) -> Option<T>) -> T {
    match env_opt(key) {
        Some(raw) => parse(&raw).unwrap_or_else(|| {
            tracing::warn!("Invalid value for {}: {:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_opt(key) {
        Some(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        None => default,
    }
}
