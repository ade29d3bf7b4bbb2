//! Actions from UI Surfaces to the Wizard

use serde::{Deserialize, Serialize};

/// Surface → wizard
///
/// Actions are handled one at a time in arrival order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardAction {
    /// Forward button: next step, or save in terminal mode
    Forward,
    /// Back button
    Back,
    /// Add archives; `None` lets the worker show its own picker
    AddFiles {
        /// Explicit archive paths
        paths: Option<Vec<String>>,
    },
    /// Remove one archive
    RemoveFile {
        /// Path as listed
        name: String,
    },
    /// Search for key files again
    FindKeys,
    /// Use one of the found keys
    SelectKey {
        /// Key identifier
        key: String,
    },
    /// Let the worker prompt for a key file
    SelectKeyManually,
    /// Save the finished bundle
    Save,
}
