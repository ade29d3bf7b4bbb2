//! Asset Selection
//!
//! The user's chosen archives and key. The worker owns the canonical file
//! list; this is the wizard's copy of its last answer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Archives, keys and the completeness verdict
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSelection {
    files: Vec<String>,
    /// Key files found in well-known locations
    pub available_keys: BTreeSet<String>,
    /// Key chosen by the user
    pub selected_key: Option<String>,
    /// Resource files the added archives do not cover (advisory)
    pub missing_required_files: Option<Vec<String>>,
}

impl AssetSelection {
    /// Empty selection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Added archive paths, in the worker's order
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Replace the file list with the worker's canonical one
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn replace_files(&mut self, files: Vec<String>) {
        let mut seen = BTreeSet::new();
        self.files = files
            .into_iter()
            .filter(|f| seen.insert(f.clone()))
            .collect();
    }

    /// Whether any archive has been added
    #[must_use]
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}
