//! Logging setup: console plus an append-only log file.

use std::fs::{self, OpenOptions};
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FILE: &str = "ldplayer-bot.log";

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `level`. When the log file cannot be opened the bot
/// still logs to the console.
pub fn init(level: &str, logs_dir: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ldplayer_bot={level}")));

    let file_layer = match open_log_file(logs_dir) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        ),
        Err(e) => {
            eprintln!("Logging to console only: {e:#}");
            None
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    std::panic::set_hook(Box::new(log_panic));
    Ok(())
}

pub fn log_path(logs_dir: &Path) -> PathBuf {
    logs_dir.join(LOG_FILE)
}

fn open_log_file(logs_dir: &Path) -> Result<fs::File> {
    fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create {}", logs_dir.display()))?;
    let path = log_path(logs_dir);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))
}

/// Routes panics through the log so they end up in the log file too.
fn log_panic(info: &PanicHookInfo<'_>) {
    let payload = info.payload();
    let msg = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("Unknown panic");
    match info.location() {
        Some(loc) => tracing::error!(
            "[PANIC] at {}:{}:{} {}",
            loc.file(),
            loc.line(),
            loc.column(),
            msg
        ),
        None => tracing::error!("[PANIC] {}", msg),
    }
}
