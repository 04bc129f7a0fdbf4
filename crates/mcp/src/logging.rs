// Logging setup: stderr for humans, a log file for post-mortems.
// Stdout carries the protocol and must never receive log lines.

use crate::config::{LogRotation, LoggingConfig};
use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const LOG_FILE_NAME: &str = "mathematica_mcp.log";

/// Rotated files kept on disk when rotation is enabled
const MAX_LOG_FILES: usize = 7;

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process or buffered file output is lost.
///
/// A log file that cannot be opened is not fatal: stderr logging stays on and
/// the failure is reported there.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let (file, file_error) = if config.file {
        match open_log_file(config) {
            Ok(file) => (Some(file), None),
            Err(err) => (None, Some(err)),
        }
    } else {
        (None, None)
    };

    let (file_layer, guard) = match file {
        Some((filter, appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_filter(filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(err) = file_error {
        tracing::warn!(error = %format!("{:#}", err), "log file disabled, logging to stderr only");
    }

    Ok(guard)
}

fn open_log_file(config: &LoggingConfig) -> Result<(EnvFilter, RollingFileAppender)> {
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level `{}`", config.level))?;
    Ok((filter, file_appender(config)?))
}

fn file_appender(config: &LoggingConfig) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!("Failed to create log directory {}", config.directory.display())
    })?;

    RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(LOG_FILE_NAME)
        .max_log_files(MAX_LOG_FILES)
        .build(&config.directory)
        .with_context(|| format!("Failed to open log file in {}", config.directory.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_never_rotation_uses_plain_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            directory: temp_dir.path().join("logs"),
            rotation: LogRotation::Never,
            ..Default::default()
        };

        let appender = file_appender(&config).unwrap();
        drop(appender);

        assert!(temp_dir.path().join("logs").join(LOG_FILE_NAME).exists());
    }

    #[test]
    fn test_unusable_log_directory_falls_back_to_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let not_a_dir = temp_dir.path().join("not-a-dir");
        std::fs::write(&not_a_dir, "").unwrap();
        let config = LoggingConfig {
            directory: not_a_dir,
            ..Default::default()
        };

        assert!(open_log_file(&config).is_err());
        // Only test in this crate that installs the global subscriber
        let guard = init(&config).unwrap();
        assert!(guard.is_none());
        tracing::info!("still logging");
    }

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(Rotation::from(LogRotation::Never), Rotation::NEVER);
        assert_eq!(Rotation::from(LogRotation::Hourly), Rotation::HOURLY);
        assert_eq!(Rotation::from(LogRotation::Daily), Rotation::DAILY);
    }
}
