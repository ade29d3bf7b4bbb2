//! Worker Connection Configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application directory name used for runtime paths
pub const APP_DIR: &str = "asset-wizard";

/// Socket file name inside the runtime directory
pub const SOCKET_FILE: &str = "worker.sock";

/// How to reach the worker process
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Socket path (None = use default)
    ///
    /// Default: `$XDG_RUNTIME_DIR/asset-wizard/worker.sock`
    /// Fallback: `/tmp/asset-wizard-$UID/worker.sock`
    pub socket_path: Option<PathBuf>,

    /// How long to wait when connecting, in milliseconds
    pub connect_timeout_ms: u64,

    /// Per-command reply timeout in milliseconds (0 = wait forever)
    ///
    /// Extraction can legitimately run for minutes, so the default is no
    /// timeout.
    pub command_timeout_ms: u64,

    /// Capacity of each event subscription's queue
    pub event_buffer: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            connect_timeout_ms: 5000,
            command_timeout_ms: 0,
            event_buffer: 256,
        }
    }
}

impl WorkerConfig {
    /// The configured socket path, or the default one
    #[must_use]
    pub fn resolved_socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(default_socket_path)
    }

    /// Connect timeout as a `Duration`
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Command timeout as a `Duration`, `None` when disabled
    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_ms > 0).then(|| Duration::from_millis(self.command_timeout_ms))
    }
}

/// Get the default worker socket path
///
/// Uses `XDG_RUNTIME_DIR` if available, otherwise `/tmp/asset-wizard-$UID/`.
#[must_use]
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILE);
    }

    // SAFETY: getuid() has no preconditions and cannot fail
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{APP_DIR}-{uid}")).join(SOCKET_FILE)
}
