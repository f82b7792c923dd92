//! Logging infrastructure for sealwatch
//!
//! Structured, multi-target logging with daily file rotation. Logs go to the
//! console and to rolling files, either in the configured log directory or in
//! the platform data directory.
//!
//! ## Targets
//!
//! - **Console**: human-readable, for running in a terminal or under a service manager
//! - **`sealwatch.<date>.log`**: every level that passes the filter
//! - **`error.<date>.log`**: warnings and errors only, the place to look for
//!   checksum mismatches and refused files
//!
//! ## Usage
//!
//! ```no_run
//! use sealwatch::logging;
//!
//! // Initialize once at startup
//! logging::init(None).expect("Failed to initialize logging");
//!
//! tracing::info!(file = "report.dat", "File signed");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Rotated files kept per log.
const MAX_LOG_FILES: usize = 10;

/// Gets the default log directory based on platform conventions
///
/// Returns:
/// - Windows: `%APPDATA%/sealwatch/logs`
/// - macOS: `~/Library/Application Support/sealwatch/logs`
/// - Linux: `~/.local/share/sealwatch/logs`
///
/// # Errors
///
/// Returns error if the platform has no data directory.
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    Ok(base_dir.join("sealwatch").join("logs"))
}

/// Create `dir` if needed.
fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    }
    Ok(())
}

fn appender(dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("Failed to create {prefix} log file appender"))
}

/// Initializes the logging system with console and file output
///
/// `log_dir` overrides the platform default from [`get_log_dir`]. Returns
/// the directory actually used.
///
/// # Errors
///
/// Returns error if the log directory cannot be created, a file appender
/// fails, or a global subscriber is already installed.
pub fn init(log_dir: Option<&Path>) -> Result<PathBuf> {
    let log_dir = match log_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_log_dir()?,
    };
    ensure_dir(&log_dir)?;

    let all_logs_appender = appender(&log_dir, "sealwatch")?;
    let error_logs_appender = appender(&log_dir, "error")?;

    // Default to INFO, allow override with RUST_LOG
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false);

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Failed to install the global log subscriber")?;

    tracing::info!(log_dir = %log_dir.display(), "Logging initialized");

    Ok(log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_log_dir() {
        let log_dir = get_log_dir().expect("Failed to get log dir");
        assert!(log_dir.ends_with("sealwatch/logs") || log_dir.ends_with("sealwatch\\logs"));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("logs");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_appender_writes_into_dir() {
        use std::io::Write as _;

        let dir = TempDir::new().unwrap();
        let mut appender = appender(dir.path(), "sealwatch").unwrap();
        appender.write_all(b"line\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.starts_with("sealwatch") && n.ends_with("log")));
    }
}
