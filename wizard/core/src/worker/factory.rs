//! Worker Factory
//!
//! Builds the worker connection a surface should use from configuration.

use super::config::WorkerConfig;
use super::traits::{TransportError, Worker};
use super::unix_socket::UnixSocketWorker;

/// Connect to the out-of-process worker described by `config`
///
/// # Errors
///
/// Returns `ConnectionFailed` when the socket cannot be reached.
pub async fn connect_worker(config: &WorkerConfig) -> Result<Box<dyn Worker>, TransportError> {
    let path = config.resolved_socket_path();
    tracing::debug!(path = %path.display(), "Connecting to worker");

    let worker = UnixSocketWorker::connect(path, config).await?;
    Ok(Box::new(worker))
}
