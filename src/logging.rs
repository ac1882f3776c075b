//! `tracing` subscriber setup.
//!
//! Filtering follows `RUST_LOG` and defaults to `warn`. The TUI owns the terminal, so its
//! logs go to a file.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Default log location for interactive sessions.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("brainfuck-stepper").join("stepper.log"))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

/// Install the global subscriber.
///
/// With `log_file` set, logs are appended there. Otherwise headless runs log to stderr and
/// interactive runs to [`default_log_path`], or nowhere when no cache directory exists.
pub fn init(log_file: Option<&Path>, headless: bool) -> Result<()> {
    let path = match log_file {
        Some(p) => Some(p.to_path_buf()),
        None if headless => None,
        None => default_log_path(),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
    let res = match path {
        Some(path) => {
            let file = open_log_file(&path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None if headless => builder.with_writer(std::io::stderr).try_init(),
        None => return Ok(()),
    };
    res.map_err(|e| anyhow::anyhow!("install log subscriber: {e}"))
}
