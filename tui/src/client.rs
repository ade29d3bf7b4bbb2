//! Wizard Client
//!
//! Thin wrapper around the wizard for TUI integration. The wizard runs on
//! its own task; the TUI talks to it only through two channels.
//!
//! # Architecture
//!
//! The TUI is a "thin client" - it doesn't contain any business logic.
//! All orchestration happens in the wizard. The TUI's job is:
//! 1. Convert terminal events to WizardActions
//! 2. Send WizardActions to the wizard task
//! 3. Receive WizardMessages
//! 4. Render display state based on messages

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use asset_wizard_core::{
    connect_worker, TransportError, Wizard, WizardAction, WizardConfig, WizardMessage, Worker,
};

/// Capacity of the action channel
const ACTION_BUFFER: usize = 32;

/// Capacity of the message channel
const MESSAGE_BUFFER: usize = 1024;

/// Client for communicating with the wizard task
pub struct WizardClient {
    actions: mpsc::Sender<WizardAction>,
    rx: mpsc::Receiver<WizardMessage>,
    task: JoinHandle<Result<(), TransportError>>,
}

impl WizardClient {
    /// Connect to the configured worker and start the wizard
    ///
    /// # Errors
    ///
    /// Fails if the worker cannot be reached.
    pub async fn connect(config: &WizardConfig) -> anyhow::Result<Self> {
        let socket = config.worker.resolved_socket_path();
        let worker = connect_worker(&config.worker)
            .await
            .with_context(|| format!("connecting to worker at {}", socket.display()))?;
        tracing::info!(worker = %worker.describe(), "Connected to worker");
        Ok(Self::spawn(worker, config))
    }

    /// Start the wizard over an already connected worker
    pub fn spawn<W: Worker + 'static>(worker: W, config: &WizardConfig) -> Self {
        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);
        let (actions, action_rx) = mpsc::channel(ACTION_BUFFER);

        let wizard = Wizard::new(worker, config, tx);
        let task = tokio::spawn(wizard.run(action_rx));

        Self { actions, rx, task }
    }

    /// Queue an action for the wizard
    ///
    /// # Errors
    ///
    /// Fails if the wizard task has stopped.
    pub async fn send(&self, action: WizardAction) -> anyhow::Result<()> {
        self.actions
            .send(action)
            .await
            .map_err(|_| anyhow::anyhow!("wizard task has stopped"))
    }

    /// Wait for the next message; `None` once the wizard task has stopped
    pub async fn recv(&mut self) -> Option<WizardMessage> {
        self.rx.recv().await
    }

    /// Receive all pending messages from the wizard (non-blocking)
    pub fn recv_all(&mut self) -> Vec<WizardMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Stop the wizard and wait for it to release the worker
    ///
    /// # Errors
    ///
    /// Returns the wizard's transport failure, or a join error if it panicked.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let Self { actions, rx, task } = self;
        drop(actions);
        // Keep draining so the wizard never blocks on a full channel
        let drain = tokio::spawn(async move {
            let mut rx = rx;
            while rx.recv().await.is_some() {}
        });

        let result = task.await.context("wizard task panicked")?;
        drain.abort();
        result.context("wizard shut down with an error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_wizard_core::{InProcessWorker, StepKind};
    use std::time::Duration;

    #[tokio::test]
    async fn test_client_round_trip_over_in_process_worker() {
        let (worker, mut endpoint) = InProcessWorker::new_pair();
        let answer = tokio::spawn(async move {
            while let Some(call) = endpoint.next_call().await {
                match call.command() {
                    "find_keys" => call.ok(serde_json::json!(["prod.keys"])),
                    _ => call.ok(serde_json::Value::Null),
                }
            }
        });

        let mut client = WizardClient::spawn(worker, &WizardConfig::default());
        client.send(WizardAction::Forward).await.unwrap();

        let navigated = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(msg) = client.recv().await {
                if let WizardMessage::Navigated { step, .. } = msg {
                    if step == StepKind::AssetSelect {
                        return true;
                    }
                }
            }
            false
        })
        .await
        .unwrap();
        assert!(navigated);

        client.shutdown().await.unwrap();
        answer.abort();
    }
}
