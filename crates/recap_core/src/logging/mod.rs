//! Logging initialization and message sanitization.
//!
//! Console output goes through `tracing-subscriber` with an env-filter;
//! a daily-rolling file layer is added when a log directory is given.
//! In production the console drops to warnings while the file keeps
//! the configured level.

mod sanitize;

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub use sanitize::{mask_api_key, sanitize_log_message, sanitize_path};

use crate::config::Settings;

/// Initialize global logging.
///
/// Returns the file writer guard, which must be held for the process
/// lifetime to keep the non-blocking writer flushing. Safe to call
/// more than once; later calls are no-ops.
pub fn init(settings: &Settings, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let file_level = settings.log_level.clone();
    let console_level = if settings.is_production() {
        "warn".to_string()
    } else {
        file_level.clone()
    };

    let console_layer = fmt::layer().with_filter(EnvFilter::new(&console_level));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "recap.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(&file_level));
            let _ = tracing_subscriber::registry()
                .with(console_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry().with(console_layer).try_init();
            None
        }
    }
}
