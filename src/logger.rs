//! Structured logging for grabbit
//!
//! Everything goes to a daily rotated file under the configured log
//! directory, as JSON lines by default. Terminal output is the job of the
//! console sink, not of this module.

use std::env::consts::{ARCH, FAMILY, OS};
use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, trace};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::ChronoUtc},
    prelude::*,
    EnvFilter,
};

use crate::config::{expand_home, LogFormat, Logging};

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Logging error: {0}")]
    Logging(String),
}

pub type LoggerResult<T> = Result<T, LoggerError>;

/// Resolved logging options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub directory: PathBuf,
    pub file_prefix: String,
    pub level: String,
    pub max_files: usize,
    pub format: LogFormat,
}

impl LogSettings {
    /// `directory_override` wins over the configured directory.
    pub fn from_config(logging: &Logging, directory_override: Option<PathBuf>) -> Self {
        Self {
            directory: directory_override.unwrap_or_else(|| expand_home(&logging.directory)),
            file_prefix: logging.file_prefix.clone(),
            level: logging.level.clone(),
            max_files: logging.max_files.max(1),
            format: logging.format,
        }
    }
}

/// `RUST_LOG` if set, the configured level otherwise.
fn build_filter(level: &str) -> LoggerResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| LoggerError::Filter {
            filter: level.to_string(),
            reason: e.to_string(),
        })
}

fn build_appender(settings: &LogSettings) -> LoggerResult<RollingFileAppender> {
    if !settings.directory.exists() {
        fs::create_dir_all(&settings.directory)?;
    }

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&settings.file_prefix)
        .max_log_files(settings.max_files)
        .build(&settings.directory)
        .map_err(|e| LoggerError::Logging(e.to_string()))
}

/// Installs the global subscriber.
///
/// The returned guard flushes the background writer when dropped, so it has
/// to be kept alive until the program exits.
pub fn init_logger(settings: &LogSettings) -> LoggerResult<WorkerGuard> {
    let appender = build_appender(settings)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let filter = build_filter(&settings.level)?;

    let layer = match settings.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_timer(ChronoUtc::rfc_3339())
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| LoggerError::Logging(e.to_string()))?;

    info!(
        log_directory = %settings.directory.display(),
        log_level = %settings.level,
        log_format = ?settings.format,
        "Logger initialized"
    );

    Ok(guard)
}

/// Logs important information about the system being used.
pub fn log_system_information() {
    trace!("Printing system information out into log for debug purposes...");
    trace!("ARCH:           \"{}\"", ARCH);
    trace!("FAMILY:         \"{}\"", FAMILY);
    trace!("OS:             \"{}\"", OS);
}
