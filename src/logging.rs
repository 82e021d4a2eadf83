use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{prelude::*, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize logging: stdout plus an optional rolling file.
///
/// Level precedence is `logging.level`, then `RUST_LOG`, then `info`. The
/// returned guard flushes the file writer on drop and must be held for the
/// life of the process. Calling this twice is harmless; the second call
/// leaves the existing subscriber in place.
#[must_use = "dropping the guard stops file logging"]
pub fn init_with_config(cfg: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter = build_filter(cfg);

    let mut layers: Vec<BoxedLayer> = vec![console_layer(cfg.format)];
    let mut guard = None;

    if cfg.enable_file_logging {
        match file_writer(cfg) {
            Some((writer, file_guard)) => {
                layers.push(file_layer(cfg.format, writer));
                guard = Some(file_guard);
            }
            None => eprintln!(
                "Failed to create log directory '{}', continuing with stdout logs",
                cfg.dir
            ),
        }
    }

    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init();

    guard
}

fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    match cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stdout);
    match format {
        LogFormat::Json => layer.json().with_ansi(false).boxed(),
        LogFormat::Text => layer.with_ansi(true).boxed(),
    }
}

fn file_layer(format: LogFormat, writer: tracing_appender::non_blocking::NonBlocking) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(writer);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Text => layer.boxed(),
    }
}

fn rotation_for(name: &str) -> Rotation {
    match name.to_lowercase().as_str() {
        "hourly" => Rotation::HOURLY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

fn file_writer(
    cfg: &LoggingConfig,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(&cfg.dir).ok()?;
    let appender = RollingFileAppender::new(rotation_for(&cfg.rotation), &cfg.dir, &cfg.filename);
    Some(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_names_fall_back_to_daily() {
        assert_eq!(rotation_for("HOURLY"), Rotation::HOURLY);
        assert_eq!(rotation_for("never"), Rotation::NEVER);
        assert_eq!(rotation_for("weekly"), Rotation::DAILY);
    }

    #[test]
    fn file_logging_creates_directory_and_returns_guard() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            dir: dir.path().join("nested").display().to_string(),
            enable_file_logging: true,
            ..LoggingConfig::default()
        };
        let guard = init_with_config(&cfg);
        assert!(guard.is_some());
        assert!(dir.path().join("nested").is_dir());
    }
}
