//! Wizard State Machine
//!
//! Tracks which step is active and whether the flow has reached its terminal
//! "bundle ready" mode. Button visibility and labels are derived from the
//! state on demand and never stored.
//!
//! ```text
//!   Browsing(0) ◄──► Browsing(1) ◄──► ... ◄──► Browsing(last)
//!                                                   │ bundle ready
//!                                                   ▼
//!                                               Terminal  (only Save)
//! ```

use serde::{Deserialize, Serialize};

use crate::steps::RenderedStep;

/// Label of the forward button once the bundle is ready
pub const SAVE_LABEL: &str = "Save";

/// Label of the forward button when the step declares none
pub const DEFAULT_FORWARD_LABEL: &str = "Next";

/// Position in the step sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    current_index: usize,
    step_count: usize,
    terminal: bool,
}

impl WizardState {
    /// Start at the first of `step_count` steps
    ///
    /// A wizard always has at least one step; zero is treated as one.
    #[must_use]
    pub fn new(step_count: usize) -> Self {
        Self {
            current_index: 0,
            step_count: step_count.max(1),
            terminal: false,
        }
    }

    /// Index of the active step
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Number of steps
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Whether the bundle is ready and only saving remains
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Whether the active step is the last one
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current_index + 1 == self.step_count
    }

    /// Move one step forward, clamping at the last step
    ///
    /// Returns whether the index changed. No-op in terminal mode.
    pub fn navigate_forward(&mut self) -> bool {
        if self.terminal || self.is_last() {
            return false;
        }
        self.current_index += 1;
        true
    }

    /// Move one step back, clamping at the first step
    ///
    /// Returns whether the index changed. No-op in terminal mode.
    pub fn navigate_backward(&mut self) -> bool {
        if self.terminal || self.current_index == 0 {
            return false;
        }
        self.current_index -= 1;
        true
    }

    /// Enter terminal mode
    ///
    /// Only allowed on the last step. Returns whether the state changed.
    pub fn enter_terminal(&mut self) -> bool {
        if self.terminal {
            return false;
        }
        if !self.is_last() {
            tracing::debug!(
                index = self.current_index,
                "Ignoring bundle-ready signal away from the last step"
            );
            return false;
        }
        self.terminal = true;
        true
    }
}

/// What the forward button does when pressed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardAction {
    /// Advance to the next step
    Next,
    /// Save the finished bundle
    Save,
}

/// One navigation button
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Shown at all
    pub visible: bool,
    /// Clickable
    pub enabled: bool,
    /// Caption
    pub label: String,
}

impl Button {
    /// Visible and enabled
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.visible && self.enabled
    }
}

/// Navigation controls for the active step
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controls {
    /// Back button
    pub back: Button,
    /// Forward button
    pub forward: Button,
    /// Effect of the forward button
    pub forward_action: ForwardAction,
}

/// Derive the navigation controls from state and the active step's gates
#[must_use]
pub fn controls(state: &WizardState, step: &RenderedStep) -> Controls {
    let back = Button {
        visible: !(state.current_index == 0 || state.terminal),
        enabled: !step.back_disabled,
        label: "Back".to_string(),
    };

    let (label, forward_action) = if state.terminal {
        (SAVE_LABEL.to_string(), ForwardAction::Save)
    } else {
        (
            step.forward_label
                .clone()
                .unwrap_or_else(|| DEFAULT_FORWARD_LABEL.to_string()),
            ForwardAction::Next,
        )
    };

    let forward = Button {
        visible: state.terminal || !state.is_last(),
        enabled: !step.forward_disabled,
        label,
    };

    Controls {
        back,
        forward,
        forward_action,
    }
}
