//! Logging configuration with journald support on Linux.
//!
//! Progress always goes to stderr. On Linux the same events are also sent
//! to systemd-journald when it is reachable; otherwise, if a log directory
//! is given, they are appended to a daily rolling file there.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system.
///
/// Log level can be controlled via the `PHOGRAPH_LOG` environment variable:
/// - `PHOGRAPH_LOG=debug` also logs every submitted traversal and its bindings
/// - `PHOGRAPH_LOG=info` for standard output (default)
/// - `PHOGRAPH_LOG=warn` for skipped inputs and errors only
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("PHOGRAPH_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(journald_layer)
                .init();

            tracing::debug!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return Ok(());
    };

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "phograph.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the worker alive for the life of the process; init() runs once.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::debug!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}

/// Default directory for the file backend.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phograph")
        .join("logs")
}
