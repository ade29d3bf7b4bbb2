//! Wizard Flow
//!
//! The state half of the wizard: steps, position, selection, the extraction
//! session and the event pump feeding it. Commands are issued by
//! [`crate::orchestrator::CommandOrchestrator`], which borrows the flow
//! mutably for the duration of a command so worker events keep being applied
//! while the command is in flight.

use crate::aggregator::EventConfig;
use crate::gates::{render_step, GatePolicy};
use crate::messages::{Outbox, WizardMessage};
use crate::pump::{EventPump, Wake};
use crate::selection::AssetSelection;
use crate::session::ExtractionSession;
use crate::state::{controls, Controls, WizardState};
use crate::steps::{RenderedStep, Step, StepKind};

/// Everything the wizard renders from
#[derive(Debug)]
pub struct Flow {
    steps: Vec<Step>,
    state: WizardState,
    gates: GatePolicy,
    /// Archives and keys
    pub(crate) selection: AssetSelection,
    /// Current extraction run
    pub(crate) session: ExtractionSession,
    pub(crate) pump: EventPump,
    outbox: Outbox,
    busy: bool,
    last_controls: Option<Controls>,
}

impl Flow {
    /// Create a flow at the first step
    #[must_use]
    pub fn new(steps: Vec<Step>, gates: GatePolicy, events: &EventConfig, outbox: Outbox) -> Self {
        let state = WizardState::new(steps.len());
        Self {
            steps,
            state,
            gates,
            selection: AssetSelection::new(),
            session: ExtractionSession::new(),
            pump: EventPump::new(events, outbox.clone()),
            outbox,
            busy: false,
            last_controls: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Position in the step sequence
    #[must_use]
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// The step sequence
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The active step
    ///
    /// `None` only for a wizard built without steps.
    #[must_use]
    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.state.current_index())
    }

    /// Archives and keys
    #[must_use]
    pub fn selection(&self) -> &AssetSelection {
        &self.selection
    }

    /// Current extraction run
    #[must_use]
    pub fn session(&self) -> &ExtractionSession {
        &self.session
    }

    /// Whether a command is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Surface channel
    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// The active step with its gates evaluated
    #[must_use]
    pub fn rendered_step(&self) -> RenderedStep {
        match self.current_step() {
            Some(step) => render_step(step, &self.selection, &self.session, &self.gates),
            None => render_step(
                &Step::new(StepKind::Intro),
                &self.selection,
                &self.session,
                &self.gates,
            ),
        }
    }

    /// Navigation controls for the active step
    #[must_use]
    pub fn controls(&self) -> Controls {
        controls(&self.state, &self.rendered_step())
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Advance one step; returns whether the index changed
    pub async fn navigate_forward(&mut self) -> bool {
        let moved = self.state.navigate_forward();
        if moved {
            self.announce_step().await;
        }
        moved
    }

    /// Go back one step; returns whether the index changed
    pub async fn navigate_backward(&mut self) -> bool {
        let moved = self.state.navigate_backward();
        if moved {
            self.announce_step().await;
        }
        moved
    }

    /// Enter terminal mode; returns whether the state changed
    pub async fn enter_terminal(&mut self) -> bool {
        let entered = self.state.enter_terminal();
        if entered {
            tracing::info!("Bundle ready");
            self.outbox.send(WizardMessage::BundleReady).await;
            self.publish_controls().await;
        }
        entered
    }

    /// Mark a command as started or finished
    pub async fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
        self.outbox.send(WizardMessage::Busy { busy }).await;
    }

    /// Publish the step the wizard is on
    pub async fn announce_step(&self) {
        if let Some(step) = self.current_step() {
            self.outbox
                .send(WizardMessage::Navigated {
                    index: self.state.current_index(),
                    step: step.kind,
                })
                .await;
        }
    }

    /// Publish the controls if they changed since last time
    pub async fn publish_controls(&mut self) {
        let current = self.controls();
        if self.last_controls.as_ref() == Some(&current) {
            return;
        }
        self.last_controls = Some(current.clone());
        self.outbox
            .send(WizardMessage::Controls { controls: current })
            .await;
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Wait for the next worker event or flush deadline (cancel-safe)
    pub async fn wait(&mut self) -> Wake {
        self.pump.wait().await
    }

    /// Apply a wake-up; enters terminal mode if the bundle became ready
    pub async fn process(&mut self, wake: Wake) {
        if self.pump.handle(wake, &mut self.session).await {
            self.enter_terminal().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::default_steps;
    use tokio::sync::mpsc;

    fn flow() -> (Flow, mpsc::Receiver<WizardMessage>) {
        let (tx, rx) = mpsc::channel(64);
        let flow = Flow::new(
            default_steps(),
            GatePolicy::default(),
            &EventConfig::default(),
            Outbox::new(tx),
        );
        (flow, rx)
    }

    #[tokio::test]
    async fn test_publish_controls_deduplicates() {
        let (mut flow, mut rx) = flow();

        flow.publish_controls().await;
        flow.publish_controls().await;

        assert!(matches!(rx.recv().await, Some(WizardMessage::Controls { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_navigation_announces_step() {
        let (mut flow, mut rx) = flow();

        assert!(flow.navigate_forward().await);
        assert_eq!(
            rx.recv().await,
            Some(WizardMessage::Navigated {
                index: 1,
                step: StepKind::AssetSelect
            })
        );

        assert!(flow.navigate_backward().await);
        assert!(!flow.navigate_backward().await);
        assert_eq!(flow.state().current_index(), 0);
    }

    #[tokio::test]
    async fn test_enter_terminal_requires_last_step() {
        let (mut flow, mut rx) = flow();

        assert!(!flow.enter_terminal().await);
        flow.navigate_forward().await;
        flow.navigate_forward().await;
        assert!(flow.enter_terminal().await);

        let mut saw_ready = false;
        while let Ok(msg) = rx.try_recv() {
            saw_ready |= msg == WizardMessage::BundleReady;
        }
        assert!(saw_ready);
        assert_eq!(flow.controls().forward.label, "Save");
    }
}
