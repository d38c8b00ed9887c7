//! Tracing subscriber setup for the driversync binary.
//!
//! Two layers share one registry:
//!
//! - stderr, filtered by `DRIVERSYNC_LOG` or, when unset, by the CLI verbosity
//! - a plain-text file at `<data_dir>/logs/driversync.log` at `info` level
//!
//! The file layer is skipped when the log directory cannot be created, so a
//! read-only data directory never stops a command from running.

use crate::output::Verbosity;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable overriding the stderr filter.
pub const LOG_ENV: &str = "DRIVERSYNC_LOG";

/// Name of the log file inside the logs directory.
pub const LOG_FILE: &str = "driversync.log";

/// Default stderr directive for a verbosity level.
#[must_use]
pub const fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Normal => "warn",
        Verbosity::Verbose => "driversync=debug,info",
    }
}

/// Stderr filter: `DRIVERSYNC_LOG` when set and valid, else the verbosity default.
#[must_use]
pub fn stderr_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Opens `<logs_dir>/driversync.log` for appending.
fn open_log_file(logs_dir: &Path) -> std::io::Result<(File, PathBuf)> {
    std::fs::create_dir_all(logs_dir)?;
    let path = logs_dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

/// Installs the global subscriber.
///
/// Returns the log file path when the file layer is active. Calling this
/// twice is harmless; the second call leaves the first subscriber in place.
pub fn init(verbosity: Verbosity, logs_dir: Option<&Path>) -> Option<PathBuf> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(stderr_filter(verbosity));

    let (file_layer, log_path) = match logs_dir.map(open_log_file) {
        Some(Ok((file, path))) => {
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
                .with_filter(EnvFilter::new("info"));
            (Some(layer), Some(path))
        }
        Some(Err(e)) => {
            eprintln!("Warning: file logging disabled: {e}");
            (None, None)
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(log_file = ?log_path, "Logging initialized");
        log_path
    } else {
        None
    }
}
