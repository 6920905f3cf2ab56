use crate::domain::settings::LogSettings;
use anyhow::Context;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the file writer alive; dropping it flushes pending records.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn parse_rotation(rotation: &str) -> Rotation {
    match rotation.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_writer(settings: &LogSettings) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(parse_rotation(&settings.rotation))
        .filename_prefix(&settings.file_name_prefix)
        .filename_suffix("log")
        .build(&settings.log_dir)
        .with_context(|| format!("Cannot write logs to {}", settings.log_dir))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// The console sink is stderr so stdout stays free for the cube display.
pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LogGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if settings.console_logging_enabled {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(settings.ansi_colors)
                .with_target(settings.show_target)
                .with_thread_ids(settings.show_thread_ids)
                .with_file(settings.show_file_line)
                .with_line_number(settings.show_file_line)
                .boxed(),
        );
    }

    let mut file_guard = None;
    if settings.file_logging_enabled {
        let (writer, guard) = file_writer(settings)?;
        file_guard = Some(guard);
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(settings.show_target)
                .with_thread_ids(settings.show_thread_ids)
                .with_file(settings.show_file_line)
                .with_line_number(settings.show_file_line)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(level_filter(&settings.level))
        .try_init()
        .context("A global log subscriber is already installed")?;

    tracing::debug!(level = %settings.level, "logger ready");
    Ok(LogGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rotation() {
        assert_eq!(parse_rotation("Hourly"), Rotation::HOURLY);
        assert_eq!(parse_rotation("never"), Rotation::NEVER);
        assert_eq!(parse_rotation("weekly"), Rotation::DAILY);
    }

    #[test]
    fn test_file_writer_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let settings = LogSettings {
            log_dir: log_dir.display().to_string(),
            file_logging_enabled: true,
            ..LogSettings::default()
        };
        let (_writer, _guard) = file_writer(&settings).unwrap();
        assert!(log_dir.is_dir());
    }
}
