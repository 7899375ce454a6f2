//! Log setup for embedding editors.
//!
//! The bridge is a library living inside an editor process, so stderr
//! belongs to the host. Logs go to a timestamped file in a directory the
//! editor chooses, with files older than the retention window pruned at
//! startup. [`default_log_directory`] is the fallback when the editor has
//! no opinion.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default retention window for old log files.
pub const DEFAULT_RETENTION_HOURS: u32 = 24;

/// Fallback log directory (~/.sql-ls-bridge/logs/).
#[must_use]
pub fn default_log_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sql-ls-bridge")
        .join("logs")
}

/// File name for a logging session started now.
fn session_file_name() -> String {
    format!("bridge-{}.log", chrono::Local::now().format("%Y%m%dT%H%M%S"))
}

/// Deletes `.log` files in `directory` older than the retention window.
///
/// Returns how many files were removed; a missing directory removes none.
pub fn prune_old_logs(directory: &Path, retention_hours: u32) -> io::Result<u32> {
    if !directory.exists() {
        return Ok(0);
    }

    let cutoff = Duration::from_secs(u64::from(retention_hours) * 3600);
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        let expired = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > cutoff);

        if expired && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }

    Ok(removed)
}

/// Initializes file logging and returns the path of the session log file.
///
/// `level` is any `EnvFilter` directive ("info", "sql_ls_bridge=debug",
/// ...); the `RUST_LOG` environment variable overrides it. Call at most
/// once per process.
///
/// # Errors
/// Returns error if the directory or log file cannot be created.
pub fn init(directory: &Path, level: &str, retention_hours: u32) -> io::Result<PathBuf> {
    fs::create_dir_all(directory)?;
    let pruned = prune_old_logs(directory, retention_hours)?;

    let path = directory.join(session_file_name());
    let file = File::create(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let file_layer = fmt::layer()
        .with_writer(file.with_max_level(tracing::Level::TRACE))
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    tracing::info!("Logging to {} at level {}", path.display(), level);
    if pruned > 0 {
        tracing::info!("Pruned {} expired log file(s)", pruned);
    }

    Ok(path)
}
