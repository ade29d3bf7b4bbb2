//! Unix Socket Worker
//!
//! Client for a worker running in its own process, reached over a Unix domain
//! socket with the frame codec from [`super::frame`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                      ┌─────────────────┐
//! │   UnixSocketWorker   │   WorkerRequest ──►  │                 │
//! │  pending: id → reply │                      │  worker process │
//! │  listeners: id → tx  │  ◄── WorkerFrame     │                 │
//! └──────────────────────┘    (reply | event)   └─────────────────┘
//! ```
//!
//! A read task routes replies to the waiting caller by request id and queues
//! events for a delivery task, which fans them out to every listener of their
//! channel. Replies never wait behind a listener with a full buffer. A write
//! task serializes outgoing requests. When the socket closes, every waiting
//! caller gets `ConnectionClosed` and every subscription ends.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};

use super::config::WorkerConfig;
use super::frame::{encode, FrameDecoder};
use super::protocol::{RequestId, WorkerFrame, WorkerRequest};
use super::traits::{InvokeError, Subscription, TransportError, Worker};
use super::{value_text, EventChannel};

type Reply = Result<Value, Value>;
type EventQueue = mpsc::UnboundedSender<(EventChannel, Value)>;

/// State shared between the handle and its I/O tasks
struct Shared {
    requests: mpsc::Sender<WorkerRequest>,
    pending: DashMap<RequestId, oneshot::Sender<Reply>>,
    listeners: DashMap<RequestId, (EventChannel, mpsc::Sender<Value>)>,
    next_id: AtomicU64,
    connected: AtomicBool,
    command_timeout: Option<Duration>,
}

impl Shared {
    fn next_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request(&self, request: WorkerRequest) -> Result<Reply, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::InvalidState("Not connected".to_string()));
        }

        let id = request.id();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(id, reply_tx);

        // The reader may have closed between the check and the insert
        if !self.connected.load(Ordering::SeqCst) {
            self.pending.remove(&id);
            return Err(TransportError::ConnectionClosed);
        }

        if self.requests.send(request).await.is_err() {
            self.pending.remove(&id);
            return Err(TransportError::SendFailed("Writer task stopped".to_string()));
        }

        let reply = match self.command_timeout {
            Some(limit) => match tokio::time::timeout(limit, reply_rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.pending.remove(&id);
                    return Err(TransportError::Timeout(format!(
                        "no reply to request {id} within {limit:?}"
                    )));
                }
            },
            None => reply_rx.await,
        };

        reply.map_err(|_| TransportError::ConnectionClosed)
    }

    /// Route one frame without waiting on any listener
    ///
    /// Events are queued for the delivery task, so a listener with a full
    /// buffer never holds up a reply.
    fn dispatch(&self, frame: WorkerFrame, events: &EventQueue) {
        match frame {
            WorkerFrame::Reply { id, outcome } => match self.pending.remove(&id) {
                Some((_, reply)) => {
                    // Receiver gone means the caller timed out
                    let _ = reply.send(outcome.into());
                }
                None => tracing::debug!(id, "Reply for unknown request"),
            },
            WorkerFrame::Event { channel, payload } => {
                if events.send((channel, payload)).is_err() {
                    tracing::debug!(channel = %channel, "Event delivery stopped");
                }
            }
        }
    }

    /// Fan one event out to every listener of its channel
    async fn deliver(&self, channel: EventChannel, payload: Value) {
        let targets: Vec<mpsc::Sender<Value>> = self
            .listeners
            .iter()
            .filter(|entry| entry.value().0 == channel)
            .map(|entry| entry.value().1.clone())
            .collect();

        for tx in targets {
            if tx.send(payload.clone()).await.is_err() {
                tracing::debug!(channel = %channel, "Listener dropped");
            }
        }
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.pending.clear();
        self.listeners.clear();
    }
}

/// Worker reached over a Unix domain socket
pub struct UnixSocketWorker {
    socket_path: PathBuf,
    shared: Arc<Shared>,
    event_buffer: usize,
}

impl UnixSocketWorker {
    /// Connect to the worker socket
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the socket cannot be reached within the
    /// configured connect timeout.
    pub async fn connect(socket_path: PathBuf, config: &WorkerConfig) -> Result<Self, TransportError> {
        let stream = match tokio::time::timeout(
            config.connect_timeout(),
            UnixStream::connect(&socket_path),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "Failed to connect to {}: {e}",
                    socket_path.display()
                )))
            }
            Err(_) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "Timed out connecting to {}",
                    socket_path.display()
                )))
            }
        };

        let (mut read_half, mut write_half) = stream.into_split();
        let (requests_tx, mut requests_rx) = mpsc::channel::<WorkerRequest>(100);

        let shared = Arc::new(Shared {
            requests: requests_tx,
            pending: DashMap::new(),
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            command_timeout: config.command_timeout(),
        });

        // Delivery task: queued events -> listeners, in arrival order
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<(EventChannel, Value)>();
        let deliverer = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some((channel, payload)) = events_rx.recv().await {
                deliverer.deliver(channel, payload).await;
            }
        });

        // Read task: socket -> replies and events
        let reader = Arc::clone(&shared);
        tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let mut buf = [0u8; 4096];

            'read: loop {
                match read_half.read(&mut buf).await {
                    Ok(0) => {
                        tracing::debug!("Worker closed the connection");
                        break;
                    }
                    Ok(n) => {
                        decoder.push(&buf[..n]);
                        loop {
                            let before = decoder.available();
                            match decoder.decode::<WorkerFrame>() {
                                Ok(Some(frame)) => reader.dispatch(frame, &events_tx),
                                Ok(None) => break,
                                Err(e) if decoder.available() < before => {
                                    tracing::warn!(error = %e, "Skipping bad frame");
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "Unrecoverable frame error");
                                    break 'read;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            reader.close();
            tracing::info!("Disconnected from worker");
        });

        // Write task: requests -> socket
        let writer = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(request) = requests_rx.recv().await {
                match encode(&request) {
                    Ok(data) => {
                        if let Err(e) = write_half.write_all(&data).await {
                            tracing::warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, id = request.id(), "Encode error");
                        writer.pending.remove(&request.id());
                    }
                }
            }
            writer.close();
        });

        tracing::info!(path = %socket_path.display(), "Connected to worker");

        Ok(Self {
            socket_path,
            shared,
            event_buffer: config.event_buffer.max(1),
        })
    }

    /// Path of the worker socket
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Whether the connection is still up
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for UnixSocketWorker {
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, InvokeError> {
        let request = WorkerRequest::Invoke {
            id: self.shared.next_id(),
            command: command.to_string(),
            args,
        };
        tracing::debug!(command, id = request.id(), "Invoking worker command");

        self.shared.request(request).await?.map_err(InvokeError::Worker)
    }

    async fn listen(&self, channel: EventChannel) -> Result<Subscription, TransportError> {
        let id = self.shared.next_id();
        let (tx, rx) = mpsc::channel(self.event_buffer);

        // Registered before the request so no event after the ack is missed
        self.shared.listeners.insert(id, (channel, tx));

        let refused = match self
            .shared
            .request(WorkerRequest::Listen { id, channel })
            .await
        {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(TransportError::InvalidState(format!(
                "Worker refused {channel}: {}",
                value_text(&e)
            ))),
            Err(e) => Some(e),
        };
        if let Some(e) = refused {
            self.shared.listeners.remove(&id);
            return Err(e);
        }

        let shared = Arc::clone(&self.shared);
        Ok(Subscription::new(channel, rx, move || {
            Box::pin(async move {
                shared.listeners.remove(&id);
                if !shared.connected.load(Ordering::SeqCst) {
                    return Ok(());
                }
                let unlisten = WorkerRequest::Unlisten {
                    id: shared.next_id(),
                    subscription: id,
                };
                match shared.request(unlisten).await? {
                    Ok(_) => Ok(()),
                    Err(e) => Err(TransportError::InvalidState(format!(
                        "Worker refused to unlisten {channel}: {}",
                        value_text(&e)
                    ))),
                }
            })
        }))
    }

    fn describe(&self) -> String {
        format!("worker at {}", self.socket_path.display())
    }
}
