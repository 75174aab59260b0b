use logroller::{LogRoller, LogRollerBuilder, Rotation, RotationAge, TimeZone};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

pub const LOG_FILE_PREFIX: &str = "app.log";
pub const LOG_FILES_KEPT: u64 = 14;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub directory: PathBuf,
    pub debug: bool,
    /// Mirror log lines to stderr as well as the file.
    pub verbose: bool,
    pub max_files: u64,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            debug: false,
            verbose: false,
            max_files: LOG_FILES_KEPT,
        }
    }
}

impl LogSettings {
    fn filter(&self) -> EnvFilter {
        if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }
}

/// Builds the appender that starts a new file at local midnight and keeps
/// the newest `max_files` files.
pub fn rolling_appender(settings: &LogSettings) -> Result<LogRoller> {
    std::fs::create_dir_all(&settings.directory)?;

    LogRollerBuilder::new(settings.directory.as_path(), Path::new(LOG_FILE_PREFIX))
        .rotation(Rotation::AgeBased(RotationAge::Daily))
        .time_zone(TimeZone::Local)
        .max_keep_files(settings.max_files)
        .build()
        .map_err(|e| {
            Error::Config(format!(
                "Failed to open log directory {}: {:?}",
                settings.directory.display(),
                e
            ))
        })
}

/// Installs the global subscriber. Keep the guard alive until exit so
/// buffered lines reach the file.
pub fn init_logging(settings: &LogSettings) -> Result<WorkerGuard> {
    let (writer, guard) = tracing_appender::non_blocking(rolling_appender(settings)?);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_target(true)
        .with_line_number(true);

    let stderr_layer = settings.verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
            .with_target(true)
            .with_line_number(true)
    });

    tracing_subscriber::registry()
        .with(settings.filter())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    debug!("Logging to {}", settings.directory.display());
    Ok(guard)
}
