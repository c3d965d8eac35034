//! Logging setup.
//!
//! The daemon logs to systemd-journald on Linux when it is reachable and to a
//! daily rolling file otherwise. The command-line tool logs to stderr so its
//! stdout stays clean JSON.
//!
//! The filter is read from `FONTSHELF_LOG` (for example `FONTSHELF_LOG=debug`
//! or `FONTSHELF_LOG=fontshelf::watcher=trace`) and defaults to `info`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "FONTSHELF_LOG";

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Default directory for the file backend.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fontshelf")
        .join("logs")
}

/// Initialize logging for a long-running process.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = env_filter("info");

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .try_init()?;

            tracing::info!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "fontshelf.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // The guard flushes on drop, so it lives as long as the process
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    tracing::info!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}

/// Initialize logging to stderr for the command-line tool. Quiet by default.
pub fn init_stderr() -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter("warn"))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;
    Ok(())
}
