//! Messages from the Wizard to UI Surfaces
//!
//! Everything a surface needs to render is delivered as a [`WizardMessage`].
//! Surfaces hold no business logic: button state comes from
//! [`WizardMessage::Controls`], never from the surface's own reasoning.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::state::Controls;
use crate::steps::StepKind;
use crate::worker::ErrorMap;

/// Notification severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Success
    Success,
}

/// Wizard → surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardMessage {
    // =========================================================================
    // Navigation
    // =========================================================================
    /// The active step changed
    Navigated {
        /// New step index
        index: usize,
        /// What the step shows
        step: StepKind,
    },

    /// Navigation buttons changed
    Controls {
        /// Current controls
        controls: Controls,
    },

    /// The bundle is ready; only saving remains
    BundleReady,

    // =========================================================================
    // Selection
    // =========================================================================
    /// The canonical file list changed
    FilesChanged {
        /// Added archives
        files: Vec<String>,
    },

    /// The completeness verdict changed
    MissingFiles {
        /// Missing resource files, `None` when complete or unknown
        files: Option<Vec<String>>,
    },

    /// Candidate key files were found
    KeysFound {
        /// Key identifiers
        keys: Vec<String>,
    },

    /// A key was selected
    KeySelected {
        /// Key identifier
        key: String,
    },

    // =========================================================================
    // Extraction
    // =========================================================================
    /// A command is in flight (or finished)
    Busy {
        /// Whether a command is in flight
        busy: bool,
    },

    /// A new extraction run began
    ExtractionStarted,

    /// Progress in percent
    Progress {
        /// 0..=100
        value: f64,
    },

    /// Current step label
    StepLabel {
        /// Label, possibly multi-line
        label: String,
    },

    /// The whole log so far
    Log {
        /// Log text
        contents: String,
    },

    /// The extraction run failed
    ExtractionFailed {
        /// Decoded worker error
        error: ErrorMap,
    },

    /// The bundle was saved
    Saved,

    // =========================================================================
    // Misc
    // =========================================================================
    /// Transient notification
    Notify {
        /// Severity
        level: NotifyLevel,
        /// Text
        message: String,
    },
}

/// Sending half of the wizard → surface channel
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::Sender<WizardMessage>,
}

impl Outbox {
    /// Wrap a channel sender
    #[must_use]
    pub fn new(tx: mpsc::Sender<WizardMessage>) -> Self {
        Self { tx }
    }

    /// Deliver a message; a departed surface is logged, not an error
    pub async fn send(&self, msg: WizardMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to surface: {}", e);
        }
    }

    /// Deliver a notification
    pub async fn notify(&self, level: NotifyLevel, message: impl Into<String>) {
        self.send(WizardMessage::Notify {
            level,
            message: message.into(),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_wire_shape() {
        let msg = WizardMessage::Progress { value: 25.0 };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "progress", "value": 25.0 })
        );

        let msg = WizardMessage::Navigated {
            index: 2,
            step: StepKind::ExtractProgress,
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "navigated", "index": 2, "step": "extract_progress" })
        );
    }

    #[tokio::test]
    async fn test_outbox_survives_closed_surface() {
        let (tx, rx) = mpsc::channel(1);
        let outbox = Outbox::new(tx);
        drop(rx);
        // Logged, never panics
        outbox.notify(NotifyLevel::Info, "nobody listening").await;
    }
}
