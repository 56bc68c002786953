//! Shared logging bootstrap for filesweep binaries.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "filesweep=info";

/// Logging configuration shared by filesweep binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Promote the console filter to the full filter instead of warn-only.
    pub verbose: bool,
    /// Directory for the rolling log file. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with a stderr layer and an optional rolling file layer.
///
/// The returned guard must be held for as long as the process logs; dropping
/// it flushes and stops the background file writer.
pub fn init_logging(config: LogConfig<'_>) -> Result<Option<WorkerGuard>> {
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let console_filter = if config.verbose {
        env_filter()
    } else {
        EnvFilter::new("warn")
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    // The file layer is optional; a single registry stack covers both cases.
    let (file_layer, guard) = match config.log_dir {
        Some(dir) => {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender =
                tracing_appender::rolling::daily(&dir, format!("{}.log", config.app_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(env_filter());
            (Some(file_layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // The global subscriber can only be installed once per process, so one
    // test exercises the full stack including the optional file layer.
    #[test]
    fn init_with_file_layer_installs_and_returns_guard() {
        let dir = TempDir::new().unwrap();
        let guard = init_logging(LogConfig {
            app_name: "filesweep-test",
            verbose: true,
            log_dir: Some(dir.path().join("logs")),
        })
        .unwrap();
        assert!(guard.is_some());
        assert!(dir.path().join("logs").is_dir());
        tracing::info!("logging initialized");
    }
}
