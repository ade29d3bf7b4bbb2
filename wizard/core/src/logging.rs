//! Logging Setup
//!
//! Surfaces own the terminal, so logs go to a file under the user's state
//! directory instead of stdout. `RUST_LOG` overrides the default filter.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::worker::config::APP_DIR;

/// Log file name inside the application state directory
pub const LOG_FILE: &str = "asset-wizard.log";

/// Where logs go when no path is given
///
/// `$XDG_STATE_HOME/asset-wizard/asset-wizard.log`, falling back to the
/// cache directory and then the system temp directory.
#[must_use]
pub fn default_log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join(LOG_FILE)
}

/// Default filter directives for the given level
#[must_use]
pub fn default_filter(level: &str) -> String {
    format!("asset_wizard_core={level},asset_wizard={level}")
}

/// Install a global subscriber that appends to `path`
///
/// # Errors
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init(path: &Path, level: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    tracing::info!(path = %path.display(), "Logging initialized");
    Ok(())
}
