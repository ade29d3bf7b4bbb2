//! Wizard - The Controller
//!
//! The [`Wizard`] ties the flow state to the command orchestrator and is the
//! only type a surface talks to. It is UI-agnostic: surfaces send
//! [`WizardAction`]s in and render the [`WizardMessage`]s that come out.
//!
//! # Design Philosophy
//!
//! - Actions are handled one at a time, in order. While one is in flight,
//!   worker events keep being applied, so progress never stalls behind a
//!   long command.
//! - Button state is derived, never stored. After every action and event the
//!   wizard re-derives the controls and publishes them if they changed.
//! - Advancing past a step moves the index first and then runs the step's
//!   advance action, so the progress page is already showing (with back
//!   locked) while extraction runs.

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::WizardConfig;
use crate::events::WizardAction;
use crate::flow::Flow;
use crate::messages::{Outbox, WizardMessage};
use crate::orchestrator::{CommandOrchestrator, ExtractionOutcome};
use crate::selection::AssetSelection;
use crate::session::ExtractionSession;
use crate::state::{Controls, ForwardAction, WizardState};
use crate::steps::{default_steps, AdvanceAction, RenderedStep, Step};
use crate::worker::{TransportError, Worker};

/// The wizard controller
pub struct Wizard<W: Worker> {
    orchestrator: CommandOrchestrator<W>,
    flow: Flow,
}

impl<W: Worker> Wizard<W> {
    /// Create a wizard over the standard step sequence
    pub fn new(worker: W, config: &WizardConfig, tx: mpsc::Sender<WizardMessage>) -> Self {
        Self::with_steps(worker, config, default_steps(), tx)
    }

    /// Create a wizard over a custom step sequence
    pub fn with_steps(
        worker: W,
        config: &WizardConfig,
        steps: Vec<Step>,
        tx: mpsc::Sender<WizardMessage>,
    ) -> Self {
        Self {
            orchestrator: CommandOrchestrator::new(worker),
            flow: Flow::new(steps, config.gates.clone(), &config.events, Outbox::new(tx)),
        }
    }

    // =========================================================================
    // Snapshot Accessors
    // =========================================================================

    /// Position in the step sequence
    #[must_use]
    pub fn state(&self) -> &WizardState {
        self.flow.state()
    }

    /// Archives and keys
    #[must_use]
    pub fn selection(&self) -> &AssetSelection {
        self.flow.selection()
    }

    /// Current extraction run
    #[must_use]
    pub fn session(&self) -> &ExtractionSession {
        self.flow.session()
    }

    /// Whether a command is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.flow.is_busy()
    }

    /// The step sequence
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        self.flow.steps()
    }

    /// The active step with its gates evaluated
    #[must_use]
    pub fn rendered_step(&self) -> RenderedStep {
        self.flow.rendered_step()
    }

    /// Navigation controls for the active step
    #[must_use]
    pub fn controls(&self) -> Controls {
        self.flow.controls()
    }

    /// When the wizard next needs a [`Self::tick`] even without events
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.flow.pump.next_wakeup()
    }

    /// The wrapped worker
    #[must_use]
    pub fn worker(&self) -> &W {
        self.orchestrator.worker()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Subscribe to worker events and look for key files
    ///
    /// # Errors
    ///
    /// Returns the subscription failure; nothing stays subscribed.
    pub async fn mount(&mut self) -> Result<(), TransportError> {
        self.flow.pump.mount(self.orchestrator.worker()).await?;
        tracing::info!(worker = %self.orchestrator.worker().describe(), "Wizard mounted");

        self.flow.announce_step().await;
        self.flow.publish_controls().await;
        self.orchestrator.find_keys(&mut self.flow).await;
        self.flow.publish_controls().await;
        Ok(())
    }

    /// Publish any pending log and release worker subscriptions in order
    ///
    /// # Errors
    ///
    /// Returns the first unsubscribe failure.
    pub async fn unmount(&mut self) -> Result<(), TransportError> {
        let result = self.flow.pump.unmount(&mut self.flow.session).await;
        tracing::info!("Wizard unmounted");
        result
    }

    /// Wait for one worker event or flush deadline and apply it
    ///
    /// Only the waiting part is cancel-safe; see [`Self::run`] for driving
    /// the wizard from a `select!`.
    pub async fn tick(&mut self) {
        let wake = self.flow.wait().await;
        self.flow.process(wake).await;
        self.flow.publish_controls().await;
    }

    /// Drive the wizard until the action channel closes
    ///
    /// Mounts first and unmounts on the way out.
    ///
    /// # Errors
    ///
    /// Returns a mount or unmount failure.
    pub async fn run(mut self, mut actions: mpsc::Receiver<WizardAction>) -> Result<(), TransportError> {
        self.mount().await?;

        loop {
            tokio::select! {
                action = actions.recv() => match action {
                    Some(action) => self.handle_action(action).await,
                    None => break,
                },
                wake = self.flow.wait() => {
                    self.flow.process(wake).await;
                    self.flow.publish_controls().await;
                }
            }
        }

        self.unmount().await
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Handle one user action to completion
    pub async fn handle_action(&mut self, action: WizardAction) {
        tracing::debug!(?action, "Handling action");

        match action {
            WizardAction::Forward => self.forward().await,
            WizardAction::Back => {
                if self.controls().back.is_active() {
                    self.flow.navigate_backward().await;
                } else {
                    tracing::debug!("Back is not available");
                }
            }
            WizardAction::AddFiles { paths } => {
                self.orchestrator.add_files(&mut self.flow, paths).await;
            }
            WizardAction::RemoveFile { name } => {
                self.orchestrator.remove_file(&mut self.flow, &name).await;
            }
            WizardAction::FindKeys => self.orchestrator.find_keys(&mut self.flow).await,
            WizardAction::SelectKey { key } => {
                self.orchestrator.select_key(&mut self.flow, &key).await;
            }
            WizardAction::SelectKeyManually => {
                self.orchestrator.select_key_manually(&mut self.flow).await;
            }
            WizardAction::Save => {
                self.orchestrator.save(&mut self.flow).await;
            }
        }

        self.flow.publish_controls().await;
    }

    /// Forward button
    ///
    /// Saves in terminal mode. Otherwise advances, then runs the advance
    /// action of the step that was left.
    async fn forward(&mut self) {
        let controls = self.controls();
        if !controls.forward.is_active() {
            tracing::debug!("Forward is not available");
            return;
        }
        if controls.forward_action == ForwardAction::Save {
            self.orchestrator.save(&mut self.flow).await;
            return;
        }

        let on_advance = self.flow.current_step().and_then(|s| s.on_advance);
        self.flow.navigate_forward().await;

        if let Some(AdvanceAction::StartExtraction) = on_advance {
            let outcome = self.start_extraction().await;
            tracing::debug!(completed = outcome.is_completed(), "Extraction returned");
        }
    }

    async fn start_extraction(&mut self) -> ExtractionOutcome {
        self.orchestrator.begin_extraction(&mut self.flow).await;
        // Back locks as soon as the run is active
        self.flow.publish_controls().await;
        self.orchestrator.run_extraction(&mut self.flow).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SAVE_LABEL;
    use crate::steps::StepKind;
    use crate::worker::{EventChannel, InProcessWorker, WorkerCall, WorkerEndpoint};
    use serde_json::{json, Value};

    fn wizard() -> (
        Wizard<InProcessWorker>,
        WorkerEndpoint,
        mpsc::Receiver<WizardMessage>,
    ) {
        let (worker, endpoint) = InProcessWorker::new_pair();
        let (tx, rx) = mpsc::channel(256);
        (Wizard::new(worker, &WizardConfig::default(), tx), endpoint, rx)
    }

    async fn expect_call(endpoint: &mut WorkerEndpoint, command: &str) -> WorkerCall {
        let call = endpoint.next_call().await.unwrap();
        assert_eq!(call.command(), command);
        call
    }

    #[tokio::test]
    async fn test_forward_from_intro_needs_no_worker() {
        let (mut wizard, _endpoint, _rx) = wizard();

        wizard.handle_action(WizardAction::Forward).await;
        assert_eq!(wizard.state().current_index(), 1);
        assert_eq!(wizard.rendered_step().kind, StepKind::AssetSelect);

        // No files yet: the asset step's gate holds the wizard in place
        wizard.handle_action(WizardAction::Forward).await;
        assert_eq!(wizard.state().current_index(), 1);

        wizard.handle_action(WizardAction::Back).await;
        assert_eq!(wizard.state().current_index(), 0);
        assert!(!wizard.controls().back.visible);
    }

    #[tokio::test]
    async fn test_extraction_success_enters_terminal() {
        let (mut wizard, mut endpoint, _rx) = wizard();
        let emitter = endpoint.emitter();
        wizard.mount_without_keys().await;

        let worker_task = tokio::spawn(async move {
            expect_call(&mut endpoint, "add_files").await.ok(json!(["romfs.zip"]));
            expect_call(&mut endpoint, "assert_added_files").await.ok(Value::Null);

            let call = expect_call(&mut endpoint, "extract_assets").await;
            emitter.emit(EventChannel::Step, json!("Bundling")).await;
            emitter.emit(EventChannel::Progress, json!(50.0)).await;
            call.ok(Value::Null);
            endpoint
        });

        wizard.handle_action(WizardAction::Forward).await;
        wizard
            .handle_action(WizardAction::AddFiles {
                paths: Some(vec!["romfs.zip".to_string()]),
            })
            .await;
        assert!(wizard.controls().forward.is_active());

        wizard.handle_action(WizardAction::Forward).await;
        let _endpoint = worker_task.await.unwrap();

        assert!(wizard.state().is_terminal());
        assert_eq!(wizard.session().step_label, "Bundling");
        assert_eq!(wizard.session().progress, 50.0);
        assert!(!wizard.session().active);
        assert!(!wizard.is_busy());

        let controls = wizard.controls();
        assert!(!controls.back.visible);
        assert_eq!(controls.forward.label, SAVE_LABEL);
    }

    impl Wizard<InProcessWorker> {
        /// Mount subscriptions only, skipping the key search
        async fn mount_without_keys(&mut self) {
            self.flow.pump.mount(self.orchestrator.worker()).await.unwrap();
        }
    }
}
