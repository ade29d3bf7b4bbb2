//! Worker Traits
//!
//! The seam between the wizard and the external extraction worker. The wizard
//! never knows how a command reaches the worker; it only invokes commands by
//! name and listens to named event channels.

use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use super::EventChannel;

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection to the worker failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection was closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send a request
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Frame serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// IO error from the underlying socket
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Transport not in expected state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The worker did not answer in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Frame checksum mismatch - data corruption detected
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Expected checksum value
        expected: u32,
        /// Actual checksum value received
        actual: u32,
    },
}

/// Failure of a single command invocation
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The request never got an answer
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The worker answered with an error value
    #[error("worker error: {0}")]
    Worker(Value),
}

/// Deferred release of a subscription
pub type ReleaseFuture = BoxFuture<'static, Result<(), TransportError>>;

type ReleaseFn = Box<dyn FnOnce() -> ReleaseFuture + Send + Sync>;

/// A live listener on one worker event channel
///
/// Payloads arrive on an internal channel. Releasing the listener is
/// asynchronous and should be awaited through [`Subscription::unlisten`].
/// A subscription dropped without being released schedules its release on
/// the current runtime, if there is one.
pub struct Subscription {
    channel: EventChannel,
    rx: mpsc::Receiver<Value>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    /// Create a subscription from a payload receiver and its release action
    pub fn new<F>(channel: EventChannel, rx: mpsc::Receiver<Value>, release: F) -> Self
    where
        F: FnOnce() -> ReleaseFuture + Send + Sync + 'static,
    {
        Self {
            channel,
            rx,
            release: Some(Box::new(release)),
        }
    }

    /// The channel this subscription listens to
    #[must_use]
    pub fn channel(&self) -> EventChannel {
        self.channel
    }

    /// Wait for the next payload
    ///
    /// Returns `None` once the worker side has gone away.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Take a payload if one is already queued
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn poll_recv(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Value>> {
        self.rx.poll_recv(cx)
    }

    /// Stop accepting payloads; a sender waiting on a full buffer is woken
    pub(crate) fn close(&mut self) {
        self.rx.close();
    }

    pub(crate) fn take_release(&mut self) -> Option<ReleaseFn> {
        self.rx.close();
        self.release.take()
    }

    /// Release the listener and wait until the worker acknowledged it
    ///
    /// # Errors
    ///
    /// Returns the transport error raised while unlistening.
    pub async fn unlisten(mut self) -> Result<(), TransportError> {
        match self.take_release() {
            Some(release) => release().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("released", &self.release.is_none())
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(release) = self.take_release() else {
            return;
        };
        let channel = self.channel;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = release().await {
                        tracing::warn!(channel = %channel, error = %e, "Deferred unlisten failed");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(channel = %channel, "Subscription dropped outside a runtime, listener leaked");
            }
        }
    }
}

/// The external extraction worker
///
/// Implementations must be cheap to share; the wizard keeps the worker behind
/// an `Arc` and invokes commands while concurrently draining events.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Invoke a named command with JSON arguments
    ///
    /// `Ok` carries the command's result (`null` for unit results).
    /// `Err(InvokeError::Worker)` carries the worker's structured error.
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, InvokeError>;

    /// Start listening to a named event channel
    async fn listen(&self, channel: EventChannel) -> Result<Subscription, TransportError>;

    /// Short human-readable description used in logs
    fn describe(&self) -> String {
        "worker".to_string()
    }
}

#[async_trait]
impl<T: Worker + ?Sized> Worker for Box<T> {
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, InvokeError> {
        (**self).invoke(command, args).await
    }

    async fn listen(&self, channel: EventChannel) -> Result<Subscription, TransportError> {
        (**self).listen(channel).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
