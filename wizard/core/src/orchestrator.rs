//! Command Orchestrator
//!
//! Every user action maps to one or two worker commands, run under the same
//! contract:
//!
//! ```text
//!   busy = true
//!   invoke(command, minimal args)        ◄── worker events keep flowing
//!     ok  ─► replace the affected slice of state
//!     err ─► "required files missing"?  ─► advisory state
//!            picker canceled?           ─► debug log
//!            anything else              ─► warn log, state unchanged
//!   busy = false
//! ```
//!
//! No command failure is fatal. Extraction is the one command whose failure
//! is kept: it lands in [`ExtractionSession::error`](crate::session::ExtractionSession).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::flow::Flow;
use crate::messages::{NotifyLevel, WizardMessage};
use crate::worker::{commands, value_text, DecodedError, ErrorMap, InvokeError, Worker};

/// How an extraction run ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// The worker reported success
    Completed,
    /// The worker reported this failure
    Failed(ErrorMap),
}

impl ExtractionOutcome {
    /// Whether the run succeeded
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Issues worker commands on behalf of the user
pub struct CommandOrchestrator<W: Worker> {
    worker: Arc<W>,
}

impl<W: Worker> CommandOrchestrator<W> {
    /// Wrap a worker
    pub fn new(worker: W) -> Self {
        Self {
            worker: Arc::new(worker),
        }
    }

    /// The wrapped worker
    #[must_use]
    pub fn worker(&self) -> &W {
        &self.worker
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Add archives, then re-check completeness
    ///
    /// With `None` the worker shows its own picker.
    pub async fn add_files(&self, flow: &mut Flow, paths: Option<Vec<String>>) {
        flow.set_busy(true).await;

        let args = match paths {
            Some(files) => json!({ "files": files }),
            None => json!({}),
        };
        match self.invoke(flow, commands::ADD_FILES, args).await {
            Ok(value) => {
                if self.apply_file_list(flow, commands::ADD_FILES, value).await {
                    self.check_completeness(flow).await;
                }
            }
            Err(e) => log_failure(commands::ADD_FILES, &e),
        }

        flow.set_busy(false).await;
    }

    /// Remove one archive
    ///
    /// An empty result skips the completeness check and clears its verdict.
    pub async fn remove_file(&self, flow: &mut Flow, name: &str) {
        flow.set_busy(true).await;

        match self
            .invoke(flow, commands::REMOVE_FILE, json!({ "fileName": name }))
            .await
        {
            Ok(value) => {
                if self.apply_file_list(flow, commands::REMOVE_FILE, value).await {
                    if flow.selection.has_files() {
                        self.check_completeness(flow).await;
                    } else {
                        set_missing(flow, None).await;
                    }
                }
            }
            Err(e) => log_failure(commands::REMOVE_FILE, &e),
        }

        flow.set_busy(false).await;
    }

    async fn apply_file_list(&self, flow: &mut Flow, command: &str, value: Value) -> bool {
        let Some(files) = decode_result::<Vec<String>>(command, value) else {
            return false;
        };
        flow.selection.replace_files(files);
        flow.outbox()
            .send(WizardMessage::FilesChanged {
                files: flow.selection.files().to_vec(),
            })
            .await;
        true
    }

    async fn check_completeness(&self, flow: &mut Flow) {
        let missing = match self
            .invoke(flow, commands::ASSERT_ADDED_FILES, json!({}))
            .await
        {
            Ok(_) => None,
            Err(e) => match DecodedError::from_invoke(&e) {
                DecodedError::RequiredFilesMissing(files) => {
                    tracing::info!(count = files.len(), "Required files missing");
                    Some(files)
                }
                _ => {
                    log_failure(commands::ASSERT_ADDED_FILES, &e);
                    None
                }
            },
        };
        set_missing(flow, missing).await;
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Look for key files in well-known locations
    pub async fn find_keys(&self, flow: &mut Flow) {
        flow.set_busy(true).await;

        match self.invoke(flow, commands::FIND_KEYS, json!({})).await {
            Ok(value) => {
                if let Some(keys) = decode_result::<Vec<String>>(commands::FIND_KEYS, value) {
                    tracing::debug!(count = keys.len(), "Found key candidates");
                    flow.selection.available_keys = keys.into_iter().collect();
                    flow.outbox()
                        .send(WizardMessage::KeysFound {
                            keys: flow.selection.available_keys.iter().cloned().collect(),
                        })
                        .await;
                }
            }
            Err(e) => log_failure(commands::FIND_KEYS, &e),
        }

        flow.set_busy(false).await;
    }

    /// Use a known key file
    pub async fn select_key(&self, flow: &mut Flow, key: &str) {
        flow.set_busy(true).await;

        match self
            .invoke(flow, commands::SET_PROD_KEY, json!({ "prodKey": key }))
            .await
        {
            Ok(_) => set_selected_key(flow, key.to_string()).await,
            Err(e) => log_failure(commands::SET_PROD_KEY, &e),
        }

        flow.set_busy(false).await;
    }

    /// Let the worker prompt for a key file
    pub async fn select_key_manually(&self, flow: &mut Flow) {
        flow.set_busy(true).await;

        match self.invoke(flow, commands::SELECT_PROD_KEY, json!({})).await {
            Ok(Value::Null) => {
                tracing::warn!(command = commands::SELECT_PROD_KEY, "Worker returned no key");
            }
            Ok(value) => set_selected_key(flow, value_text(&value)).await,
            Err(e) => log_failure(commands::SELECT_PROD_KEY, &e),
        }

        flow.set_busy(false).await;
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// Reset the session and mark a run as active
    pub async fn begin_extraction(&self, flow: &mut Flow) {
        flow.set_busy(true).await;
        flow.session.reset();
        flow.pump.begin_run();
        flow.session.active = true;
        flow.outbox().send(WizardMessage::ExtractionStarted).await;
        tracing::info!(files = flow.selection.files().len(), "Extraction started");
    }

    /// Run the extraction begun by [`Self::begin_extraction`]
    ///
    /// Success moves the wizard to terminal mode. Failure keeps the decoded
    /// error in the session and resets progress to zero.
    pub async fn run_extraction(&self, flow: &mut Flow) -> ExtractionOutcome {
        let outcome = match self
            .invoke(flow, commands::EXTRACT_ASSETS, json!({}))
            .await
        {
            Ok(_) => ExtractionOutcome::Completed,
            Err(e) => {
                let error = e.to_error_map();
                tracing::warn!(error = %e, "Extraction failed");
                flow.session.error = Some(error.clone());
                flow.session.progress = 0.0;
                flow.outbox()
                    .send(WizardMessage::ExtractionFailed {
                        error: error.clone(),
                    })
                    .await;
                flow.outbox()
                    .send(WizardMessage::Progress { value: 0.0 })
                    .await;
                ExtractionOutcome::Failed(error)
            }
        };

        flow.session.active = false;
        flow.set_busy(false).await;

        if outcome.is_completed() {
            tracing::info!("Extraction finished");
            flow.enter_terminal().await;
        }
        outcome
    }

    /// Reset, run and finish an extraction
    pub async fn start(&self, flow: &mut Flow) -> ExtractionOutcome {
        self.begin_extraction(flow).await;
        self.run_extraction(flow).await
    }

    /// Save the finished bundle
    ///
    /// Only valid in terminal mode. Returns whether the worker saved it.
    pub async fn save(&self, flow: &mut Flow) -> bool {
        if !flow.state().is_terminal() {
            tracing::debug!("Save requested before the bundle is ready");
            return false;
        }

        flow.set_busy(true).await;
        let saved = match self
            .invoke(flow, commands::SAVE_BUNDLE_DATA, json!({}))
            .await
        {
            Ok(_) => {
                flow.outbox().send(WizardMessage::Saved).await;
                flow.outbox()
                    .notify(NotifyLevel::Success, "Bundle saved")
                    .await;
                true
            }
            Err(e) => {
                log_failure(commands::SAVE_BUNDLE_DATA, &e);
                false
            }
        };
        flow.set_busy(false).await;
        saved
    }

    // =========================================================================
    // Invocation
    // =========================================================================

    /// Invoke a command while applying worker events as they arrive
    async fn invoke(
        &self,
        flow: &mut Flow,
        command: &'static str,
        args: Value,
    ) -> Result<Value, InvokeError> {
        tracing::debug!(command, worker = %self.worker.describe(), "Invoking");

        let worker = Arc::clone(&self.worker);
        let call = worker.invoke(command, args);
        tokio::pin!(call);

        let outcome = loop {
            tokio::select! {
                biased;
                wake = flow.wait() => flow.process(wake).await,
                outcome = &mut call => break outcome,
            }
        };

        // Events queued before the reply are applied first
        while let Some(wake) = flow.pump.try_event() {
            flow.process(wake).await;
        }
        outcome
    }
}

fn decode_result<T: DeserializeOwned>(command: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(command, error = %e, "Unexpected command result");
            None
        }
    }
}

fn log_failure(command: &str, err: &InvokeError) {
    match DecodedError::from_invoke(err) {
        DecodedError::Canceled => tracing::debug!(command, "Selection canceled"),
        _ => tracing::warn!(command, error = %err, "Command failed"),
    }
}

async fn set_missing(flow: &mut Flow, files: Option<Vec<String>>) {
    flow.selection.missing_required_files.clone_from(&files);
    flow.outbox()
        .send(WizardMessage::MissingFiles { files })
        .await;
}

async fn set_selected_key(flow: &mut Flow, key: String) {
    tracing::info!(key = %key, "Key selected");
    flow.selection.selected_key = Some(key.clone());
    flow.outbox().send(WizardMessage::KeySelected { key }).await;
}
