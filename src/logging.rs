//! Tracing setup
//!
//! Console output is human-readable by default (`RUST_LOG` controls the
//! filter, `info` otherwise). When a log directory is configured, every
//! event is also written as JSON to a rotating file: one line per monitoring
//! tick and per recovery action, which is the only durable record the
//! supervisor keeps.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogRotation, LoggingConfig};

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the life of the process.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (console_plain, console_json) = if config.json_console {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer().with_target(false)), None)
    };

    let (file_layer, guard) = match file_appender(config) {
        Ok(Some(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        Ok(None) => (None, None),
        Err(e) => {
            eprintln!("File logging disabled: {e}");
            (None, None)
        }
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(console_plain)
        .with(console_json)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Logging already initialised: {e}");
    }

    guard
}

/// Console-only subscriber for use before the config (and with it the
/// file sink) is known, via [`tracing::subscriber::with_default`].
pub fn console_subscriber() -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .finish()
}

fn rotation(r: LogRotation) -> Rotation {
    match r {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// Rolling appender for the configured directory, `None` when file logging is off.
fn file_appender(config: &LoggingConfig) -> Result<Option<RollingFileAppender>, String> {
    let Some(dir) = &config.directory else {
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .map_err(|e| format!("cannot create log directory {}: {e}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(rotation(config.rotation))
        .filename_prefix(&config.file_prefix)
        .build(dir)
        .map(Some)
        .map_err(|e| format!("cannot open log file in {}: {e}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_directory_means_no_file() {
        let config = LoggingConfig {
            directory: None,
            ..LoggingConfig::default()
        };
        assert!(file_appender(&config).unwrap().is_none());
    }

    #[test]
    fn test_appender_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        let config = LoggingConfig {
            directory: Some(dir.clone()),
            rotation: LogRotation::Never,
            ..LoggingConfig::default()
        };
        assert!(file_appender(&config).unwrap().is_some());
        assert!(dir.is_dir());
    }
}
