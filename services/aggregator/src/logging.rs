//! `tracing`/`tracing-subscriber` initialization. Console formatting is the
//! default; `log.file_format` switches to line-oriented JSON for shipping to
//! a log collector, matching the `console_format`/`file_format` toggle the
//! configuration schema exposes. When `log.path` is set, output additionally
//! (or instead, when `console_format` is off) goes to that file through a
//! non-blocking `tracing-appender` writer.

use config::LogConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. The returned guard flushes the file
/// writer on drop and must be held for the lifetime of the process; `None`
/// means no file appender was configured.
pub fn init(log_config: &LogConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(&log_config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if log_config.path.is_empty() {
        if log_config.file_format {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(log_config.console_format)
                .init();
        }
        return None;
    }

    let path = Path::new(&log_config.path);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_else(|| path.as_os_str());
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    if log_config.file_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(non_blocking)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(log_config.console_format)
            .with_writer(non_blocking)
            .init();
    }

    Some(guard)
}
