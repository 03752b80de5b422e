//! Log subscriber setup for the command-line binary

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::core::error::{Error, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Filter directive for the `-v`/`-q` flags, `None` to keep the configured level
pub fn level_for(verbose: u8, quiet: bool) -> Option<&'static str> {
    if quiet {
        return Some("error");
    }
    match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over both `level` and the configured level. Logs go to
/// stderr, and also to a daily rotated file when one is configured; keep the
/// returned guard alive until exit so the file writer flushes.
pub fn init_logging(config: &LoggingConfig, level: Option<&str>) -> Result<Option<WorkerGuard>> {
    let directive = level.unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .map_err(|e| Error::Configuration(format!("Invalid log level '{directive}': {e}")))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(true);
    layers.push(if config.json { stderr.json().boxed() } else { stderr.boxed() });

    let guard = match &config.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(rolling_appender(path)?);
            let file = fmt::layer().with_writer(writer).with_ansi(false);
            layers.push(if config.json { file.json().boxed() } else { file.boxed() });
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Configuration(format!("Failed to initialise logging: {e}")))?;

    Ok(guard)
}

fn rolling_appender(path: &Path) -> Result<tracing_appender::rolling::RollingFileAppender> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Configuration(format!("Log file path has no file name: {}", path.display())))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Configuration(format!("Cannot create log directory {}: {e}", dir.display())))?;
    Ok(tracing_appender::rolling::daily(dir, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_flags() {
        assert_eq!(level_for(0, false), None);
        assert_eq!(level_for(1, false), Some("debug"));
        assert_eq!(level_for(3, false), Some("trace"));
        assert_eq!(level_for(2, true), Some("error"));
    }

    #[test]
    fn test_appender_rejects_bare_root() {
        let err = rolling_appender(Path::new("/")).unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }

    #[test]
    fn test_appender_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("session.log");
        rolling_appender(&nested).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}
