//! Logging setup: compact console output, with an optional session log
//! file alongside it. The console filter defaults to `info` and is
//! overridable through `RUST_LOG`.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking file writer alive; dropping it flushes and
/// closes the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the global subscriber.
///
/// Console output is always on. When `log_dir` is given the same events
/// are also appended to `treescout.log` inside it, truncated at session
/// start.
///
/// # Errors
///
/// Returns an error when the log directory cannot be created or the log
/// file cannot be truncated.
pub fn init_logging(log_dir: Option<&str>, default_level: &str) -> Result<LoggingGuard, io::Error> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .compact();

    let mut file_guard = None;
    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let log_path = Path::new(dir).join(log_file_name());
            fs::write(&log_path, "")?;
            let appender = tracing_appender::rolling::never(dir, log_file_name());
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

pub fn log_file_name() -> &'static str {
    "treescout.log"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn log_file_name_is_stable() {
        assert_eq!(log_file_name(), "treescout.log");
    }

    #[test]
    fn session_start_truncates_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path: PathBuf = dir.path().join(log_file_name());
        fs::write(&path, "previous session output").expect("seed file");

        // init_logging cannot run here (global subscriber), so exercise
        // the same truncation step it performs.
        fs::write(&path, "").expect("truncate");
        assert_eq!(fs::read_to_string(&path).expect("read"), "");
    }
}
