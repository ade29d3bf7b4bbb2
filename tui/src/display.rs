//! Display State Types
//!
//! What the TUI renders, derived only from [`WizardMessage`]s.
//!
//! # Design Philosophy
//!
//! The TUI is a thin client. It never decides whether a button is enabled or
//! which step comes next; it shows the [`Controls`] the wizard published and
//! the data that came with them. The only state it owns is cursor position
//! in lists.

use asset_wizard_core::worker::ErrorMap;
use asset_wizard_core::{Controls, NotifyLevel, StepKind, WizardMessage};

/// The full display state for the TUI
#[derive(Clone, Debug)]
pub struct DisplayState {
    /// Active step index
    pub step_index: usize,
    /// Active step kind
    pub step: StepKind,
    /// Navigation controls as last published
    pub controls: Option<Controls>,
    /// Added archives
    pub files: Vec<String>,
    /// Highlighted archive in the file list
    pub highlighted: usize,
    /// Found key files
    pub keys: Vec<String>,
    /// Key in use
    pub selected_key: Option<String>,
    /// Resource files the archives do not cover
    pub missing_files: Option<Vec<String>>,
    /// A command is in flight
    pub busy: bool,
    /// Extraction progress in percent
    pub progress: f64,
    /// Worker's current step label
    pub step_label: String,
    /// Extraction log
    pub log: String,
    /// Last extraction failure
    pub error: Option<ErrorMap>,
    /// The bundle is ready to save
    pub bundle_ready: bool,
    /// The bundle was saved
    pub saved: bool,
    /// Pending notification (if any)
    pub notification: Option<DisplayNotification>,
    /// Progress at which the save hint shows
    pub completion_threshold: f64,
}

impl DisplayState {
    /// Create a new display state
    #[must_use]
    pub fn new(completion_threshold: f64) -> Self {
        Self {
            step_index: 0,
            step: StepKind::Intro,
            controls: None,
            files: Vec::new(),
            highlighted: 0,
            keys: Vec::new(),
            selected_key: None,
            missing_files: None,
            busy: false,
            progress: 0.0,
            step_label: String::new(),
            log: String::new(),
            error: None,
            bundle_ready: false,
            saved: false,
            notification: None,
            completion_threshold,
        }
    }

    /// Apply a WizardMessage to update display state
    pub fn apply_message(&mut self, msg: WizardMessage) {
        match msg {
            // Navigation
            WizardMessage::Navigated { index, step } => {
                self.step_index = index;
                self.step = step;
            }
            WizardMessage::Controls { controls } => {
                self.controls = Some(controls);
            }
            WizardMessage::BundleReady => {
                self.bundle_ready = true;
            }

            // Selection
            WizardMessage::FilesChanged { files } => {
                self.files = files;
                self.highlighted = self.highlighted.min(self.files.len().saturating_sub(1));
            }
            WizardMessage::MissingFiles { files } => {
                self.missing_files = files;
            }
            WizardMessage::KeysFound { keys } => {
                self.keys = keys;
            }
            WizardMessage::KeySelected { key } => {
                self.selected_key = Some(key);
            }

            // Extraction
            WizardMessage::Busy { busy } => {
                self.busy = busy;
            }
            WizardMessage::ExtractionStarted => {
                self.progress = 0.0;
                self.step_label.clear();
                self.log.clear();
                self.error = None;
                self.saved = false;
            }
            WizardMessage::Progress { value } => {
                self.progress = value;
            }
            WizardMessage::StepLabel { label } => {
                self.step_label = label;
            }
            WizardMessage::Log { contents } => {
                self.log = contents;
            }
            WizardMessage::ExtractionFailed { error } => {
                self.error = Some(error);
            }
            WizardMessage::Saved => {
                self.saved = true;
            }

            // Misc
            WizardMessage::Notify { level, message } => {
                self.notification = Some(DisplayNotification { level, message });
            }
        }
    }

    /// Move the file highlight up
    pub fn highlight_previous(&mut self) {
        self.highlighted = self.highlighted.saturating_sub(1);
    }

    /// Move the file highlight down
    pub fn highlight_next(&mut self) {
        if self.highlighted + 1 < self.files.len() {
            self.highlighted += 1;
        }
    }

    /// The archive under the highlight
    #[must_use]
    pub fn highlighted_file(&self) -> Option<&str> {
        self.files.get(self.highlighted).map(String::as_str)
    }

    /// The found key after the selected one, wrapping around
    #[must_use]
    pub fn next_key(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let next = match self
            .selected_key
            .as_ref()
            .and_then(|sel| self.keys.iter().position(|k| k == sel))
        {
            Some(pos) => (pos + 1) % self.keys.len(),
            None => 0,
        };
        Some(self.keys[next].as_str())
    }

    /// Gauge ratio, clamped to 0..=1
    #[must_use]
    pub fn progress_ratio(&self) -> f64 {
        (self.progress / 100.0).clamp(0.0, 1.0)
    }

    /// Whether to tell the user the bundle can be saved
    #[must_use]
    pub fn show_save_hint(&self) -> bool {
        !self.saved && self.progress >= self.completion_threshold
    }

    /// Error entries as `[key]: value` lines
    #[must_use]
    pub fn error_lines(&self) -> Vec<String> {
        self.error
            .iter()
            .flat_map(|map| map.iter().map(|(k, v)| format!("[{k}]: {v}")))
            .collect()
    }

    /// Clear the notification
    pub fn clear_notification(&mut self) {
        self.notification = None;
    }
}

/// A notification to display
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayNotification {
    /// Notification level
    pub level: NotifyLevel,
    /// Message content
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset_wizard_core::{Button, ForwardAction};
    use pretty_assertions::assert_eq;

    fn state() -> DisplayState {
        DisplayState::new(99.9)
    }

    #[test]
    fn test_navigation_and_controls() {
        let mut display = state();
        display.apply_message(WizardMessage::Navigated {
            index: 1,
            step: StepKind::AssetSelect,
        });
        let controls = Controls {
            back: Button {
                visible: true,
                enabled: true,
                label: "Back".to_string(),
            },
            forward: Button {
                visible: true,
                enabled: false,
                label: "Extract".to_string(),
            },
            forward_action: ForwardAction::Next,
        };
        display.apply_message(WizardMessage::Controls {
            controls: controls.clone(),
        });

        assert_eq!(display.step_index, 1);
        assert_eq!(display.step, StepKind::AssetSelect);
        assert_eq!(display.controls, Some(controls));
    }

    #[test]
    fn test_files_changed_clamps_highlight() {
        let mut display = state();
        display.apply_message(WizardMessage::FilesChanged {
            files: vec!["a.xci".to_string(), "b.nsp".to_string()],
        });
        display.highlight_next();
        display.highlight_next();
        assert_eq!(display.highlighted_file(), Some("b.nsp"));

        display.apply_message(WizardMessage::FilesChanged {
            files: vec!["a.xci".to_string()],
        });
        assert_eq!(display.highlighted_file(), Some("a.xci"));

        display.apply_message(WizardMessage::FilesChanged { files: vec![] });
        assert_eq!(display.highlighted_file(), None);
        display.highlight_previous();
        assert_eq!(display.highlighted, 0);
    }

    #[test]
    fn test_next_key_cycles() {
        let mut display = state();
        assert_eq!(display.next_key(), None);

        display.apply_message(WizardMessage::KeysFound {
            keys: vec!["prod.keys".to_string(), "title.keys".to_string()],
        });
        assert_eq!(display.next_key(), Some("prod.keys"));

        display.apply_message(WizardMessage::KeySelected {
            key: "prod.keys".to_string(),
        });
        assert_eq!(display.next_key(), Some("title.keys"));

        display.apply_message(WizardMessage::KeySelected {
            key: "title.keys".to_string(),
        });
        assert_eq!(display.next_key(), Some("prod.keys"));
    }

    #[test]
    fn test_extraction_started_clears_previous_run() {
        let mut display = state();
        display.apply_message(WizardMessage::Progress { value: 42.0 });
        display.apply_message(WizardMessage::Log {
            contents: "old\n".to_string(),
        });
        display.apply_message(WizardMessage::ExtractionFailed {
            error: ErrorMap::from([("Io".to_string(), "denied".to_string())]),
        });

        display.apply_message(WizardMessage::ExtractionStarted);

        assert_eq!(display.progress, 0.0);
        assert!(display.log.is_empty());
        assert!(display.error.is_none());
    }

    #[test]
    fn test_progress_ratio_is_clamped() {
        let mut display = state();
        display.apply_message(WizardMessage::Progress { value: 150.0 });
        assert_eq!(display.progress_ratio(), 1.0);

        display.apply_message(WizardMessage::Progress { value: 25.0 });
        assert_eq!(display.progress_ratio(), 0.25);
    }

    #[test]
    fn test_save_hint_at_threshold() {
        let mut display = state();
        display.apply_message(WizardMessage::Progress { value: 99.8 });
        assert!(!display.show_save_hint());

        display.apply_message(WizardMessage::Progress { value: 99.9 });
        assert!(display.show_save_hint());

        display.apply_message(WizardMessage::Saved);
        assert!(!display.show_save_hint());
    }

    #[test]
    fn test_error_lines_format() {
        let mut display = state();
        display.apply_message(WizardMessage::ExtractionFailed {
            error: ErrorMap::from([
                ("InvalidSignature".to_string(), "checksum mismatch".to_string()),
                ("Io".to_string(), "denied".to_string()),
            ]),
        });

        assert_eq!(
            display.error_lines(),
            vec![
                "[InvalidSignature]: checksum mismatch".to_string(),
                "[Io]: denied".to_string(),
            ]
        );
    }

    #[test]
    fn test_notification() {
        let mut display = state();
        display.apply_message(WizardMessage::Notify {
            level: NotifyLevel::Success,
            message: "Bundle saved".to_string(),
        });
        assert_eq!(
            display.notification,
            Some(DisplayNotification {
                level: NotifyLevel::Success,
                message: "Bundle saved".to_string(),
            })
        );

        display.clear_notification();
        assert!(display.notification.is_none());
    }
}
