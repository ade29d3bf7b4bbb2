//! Extraction Session
//!
//! UI-visible state of one extraction run. Reset at the start of every run.

use serde::{Deserialize, Serialize};

use crate::worker::ErrorMap;

/// Progress, labels, log and outcome of the current run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSession {
    /// Percent complete, 0..=100
    pub progress: f64,
    /// Label of the worker's current step; may span several lines
    pub step_label: String,
    /// Log text as last published to the UI
    pub log: String,
    /// Failure of the last run, if it failed
    pub error: Option<ErrorMap>,
    /// A run is in flight
    pub active: bool,
}

impl ExtractionSession {
    /// Fresh, idle session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything a previous run left behind
    pub fn reset(&mut self) {
        self.progress = 0.0;
        self.step_label.clear();
        self.log.clear();
        self.error = None;
    }

    /// Lines of the step label
    pub fn step_lines(&self) -> impl Iterator<Item = &str> {
        self.step_label.split('\n')
    }
}
