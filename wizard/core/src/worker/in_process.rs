//! In-Process Worker
//!
//! Channel-based worker connection for embedding a worker in the same process
//! as the wizard, and for driving the wizard in tests.
//!
//! # Usage
//!
//! ```ignore
//! let (worker, mut endpoint) = InProcessWorker::new_pair();
//! let emitter = endpoint.emitter();
//!
//! tokio::spawn(async move {
//!     while let Some(call) = endpoint.next_call().await {
//!         match call.command() {
//!             "extract_assets" => {
//!                 emitter.emit(EventChannel::Progress, json!(50.0)).await;
//!                 call.ok(Value::Null);
//!             }
//!             _ => call.err(json!("unsupported")),
//!         }
//!     }
//! });
//!
//! let wizard = Wizard::new(worker, config, tx);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::traits::{InvokeError, Subscription, TransportError, Worker};
use super::EventChannel;

const DEFAULT_CAPACITY: usize = 100;

type Listeners = HashMap<EventChannel, Vec<(u64, mpsc::Sender<Value>)>>;

#[derive(Default)]
struct ListenerTable {
    next_id: AtomicU64,
    listeners: Mutex<Listeners>,
}

impl ListenerTable {
    fn add(&self, channel: EventChannel, tx: mpsc::Sender<Value>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().entry(channel).or_default().push((id, tx));
        id
    }

    fn remove(&self, channel: EventChannel, id: u64) {
        if let Some(list) = self.listeners.lock().get_mut(&channel) {
            list.retain(|(listener, _)| *listener != id);
        }
    }

    fn senders(&self, channel: EventChannel) -> Vec<mpsc::Sender<Value>> {
        self.listeners
            .lock()
            .get(&channel)
            .map(|list| list.iter().map(|(_, tx)| tx.clone()).collect())
            .unwrap_or_default()
    }

    fn count(&self, channel: EventChannel) -> usize {
        self.listeners.lock().get(&channel).map_or(0, Vec::len)
    }
}

/// A command invocation waiting for the embedded worker to answer
#[derive(Debug)]
pub struct WorkerCall {
    command: String,
    args: Value,
    reply: oneshot::Sender<Result<Value, Value>>,
}

impl WorkerCall {
    /// Command name
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Command arguments
    #[must_use]
    pub fn args(&self) -> &Value {
        &self.args
    }

    /// Answer the call
    pub fn respond(self, outcome: Result<Value, Value>) {
        if self.reply.send(outcome).is_err() {
            tracing::debug!(command = %self.command, "Caller went away before the reply");
        }
    }

    /// Answer with a result
    pub fn ok(self, value: Value) {
        self.respond(Ok(value));
    }

    /// Answer with a structured error
    pub fn err(self, error: Value) {
        self.respond(Err(error));
    }
}

/// Publishes events to every current listener of a channel
#[derive(Clone)]
pub struct EventEmitter {
    table: Arc<ListenerTable>,
}

impl EventEmitter {
    /// Publish a payload, returning how many listeners received it
    pub async fn emit(&self, channel: EventChannel, payload: Value) -> usize {
        let mut delivered = 0;
        for tx in self.table.senders(channel) {
            if tx.send(payload.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of active listeners on a channel
    #[must_use]
    pub fn listener_count(&self, channel: EventChannel) -> usize {
        self.table.count(channel)
    }
}

/// The embedded worker's side of the pair
pub struct WorkerEndpoint {
    calls: mpsc::Receiver<WorkerCall>,
    emitter: EventEmitter,
}

impl WorkerEndpoint {
    /// Wait for the next invocation
    ///
    /// Returns `None` once every [`InProcessWorker`] handle is dropped.
    pub async fn next_call(&mut self) -> Option<WorkerCall> {
        self.calls.recv().await
    }

    /// Take an invocation if one is queued
    pub fn try_next_call(&mut self) -> Option<WorkerCall> {
        self.calls.try_recv().ok()
    }

    /// Event publisher for this endpoint
    #[must_use]
    pub fn emitter(&self) -> EventEmitter {
        self.emitter.clone()
    }
}

/// Wizard side of an in-process worker connection
pub struct InProcessWorker {
    calls: mpsc::Sender<WorkerCall>,
    table: Arc<ListenerTable>,
    event_capacity: usize,
    connected: Arc<AtomicBool>,
}

impl InProcessWorker {
    /// Create a connected pair with default channel capacity
    #[must_use]
    pub fn new_pair() -> (Self, WorkerEndpoint) {
        Self::new_pair_with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a connected pair with custom channel capacity
    #[must_use]
    pub fn new_pair_with_capacity(capacity: usize) -> (Self, WorkerEndpoint) {
        let (calls_tx, calls_rx) = mpsc::channel(capacity);
        let table = Arc::new(ListenerTable::default());

        let worker = Self {
            calls: calls_tx,
            table: Arc::clone(&table),
            event_capacity: capacity,
            connected: Arc::new(AtomicBool::new(true)),
        };
        let endpoint = WorkerEndpoint {
            calls: calls_rx,
            emitter: EventEmitter { table },
        };
        (worker, endpoint)
    }

    /// Refuse further calls
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::InvalidState(
                "Worker not connected".to_string(),
            ))
        }
    }
}

#[async_trait]
impl Worker for InProcessWorker {
    async fn invoke(&self, command: &str, args: Value) -> Result<Value, InvokeError> {
        self.ensure_connected()?;

        let (reply, outcome) = oneshot::channel();
        self.calls
            .send(WorkerCall {
                command: command.to_string(),
                args,
                reply,
            })
            .await
            .map_err(|_| TransportError::SendFailed("Worker endpoint closed".to_string()))?;

        match outcome.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(InvokeError::Worker(error)),
            Err(_) => Err(TransportError::ConnectionClosed.into()),
        }
    }

    async fn listen(&self, channel: EventChannel) -> Result<Subscription, TransportError> {
        self.ensure_connected()?;

        let (tx, rx) = mpsc::channel(self.event_capacity);
        let id = self.table.add(channel, tx);
        let table = Arc::clone(&self.table);

        Ok(Subscription::new(channel, rx, move || {
            Box::pin(async move {
                table.remove(channel, id);
                Ok::<(), TransportError>(())
            })
        }))
    }

    fn describe(&self) -> String {
        "in-process worker".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_invoke_roundtrip() {
        let (worker, mut endpoint) = InProcessWorker::new_pair();

        let server = tokio::spawn(async move {
            let call = endpoint.next_call().await.unwrap();
            assert_eq!(call.command(), "remove_file");
            assert_eq!(call.args(), &json!({ "fileName": "a.xci" }));
            call.ok(json!([]));
        });

        let result = worker
            .invoke("remove_file", json!({ "fileName": "a.xci" }))
            .await
            .unwrap();
        assert_eq!(result, json!([]));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_worker_error() {
        let (worker, mut endpoint) = InProcessWorker::new_pair();

        tokio::spawn(async move {
            let call = endpoint.next_call().await.unwrap();
            call.err(json!("ProdKeyNotSet"));
        });

        let err = worker.invoke("extract_assets", json!({})).await.unwrap_err();
        assert!(matches!(err, InvokeError::Worker(v) if v == json!("ProdKeyNotSet")));
    }

    #[tokio::test]
    async fn test_invoke_after_endpoint_dropped() {
        let (worker, endpoint) = InProcessWorker::new_pair();
        drop(endpoint);

        let err = worker.invoke("find_keys", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Transport(TransportError::SendFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnected_worker_refuses_calls() {
        let (worker, _endpoint) = InProcessWorker::new_pair();
        worker.disconnect();

        assert!(matches!(
            worker.listen(EventChannel::Step).await,
            Err(TransportError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_emit_reaches_listeners_until_unlisten() {
        let (worker, endpoint) = InProcessWorker::new_pair();
        let emitter = endpoint.emitter();

        let mut sub = worker.listen(EventChannel::Message).await.unwrap();
        assert_eq!(emitter.listener_count(EventChannel::Message), 1);
        assert_eq!(emitter.listener_count(EventChannel::Progress), 0);

        assert_eq!(emitter.emit(EventChannel::Message, json!("Bundling")).await, 1);
        assert_eq!(emitter.emit(EventChannel::Progress, json!(3.0)).await, 0);
        assert_eq!(sub.recv().await, Some(json!("Bundling")));

        sub.unlisten().await.unwrap();
        assert_eq!(emitter.listener_count(EventChannel::Message), 0);
        assert_eq!(emitter.emit(EventChannel::Message, json!("late")).await, 0);
    }
}
