//! Step Gate Policies
//!
//! Pure predicates that decide whether a step's buttons are enabled. They take
//! snapshots and hold no state, so they are evaluated again on every render
//! and always agree for the same inputs.
//!
//! - Asset selection: forward needs at least one archive, and a key whenever
//!   an archive's extension is in the key-required set.
//! - Extraction progress: back is locked while a run is active.
//!
//! A missing-required-files verdict never blocks anything; it is shown as a
//! warning only.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::selection::AssetSelection;
use crate::session::ExtractionSession;
use crate::steps::{RenderedStep, Step, StepKind};

/// Tunable inputs of the gate predicates
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Enforce the key rule at all
    pub require_key: bool,
    /// Lowercase extensions, with leading dot, that need a key
    pub key_required_extensions: Vec<String>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            require_key: true,
            key_required_extensions: vec![".xci".to_string(), ".nsp".to_string()],
        }
    }
}

impl GatePolicy {
    /// Whether this archive can only be read with a key
    #[must_use]
    pub fn needs_key(&self, file: &str) -> bool {
        let Some(ext) = Path::new(file).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = format!(".{}", ext.to_lowercase());
        self.key_required_extensions.iter().any(|e| *e == ext)
    }
}

/// Normalize an extension to lowercase with a leading dot
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Forward gate of the asset selection step
#[must_use]
pub fn asset_forward_disabled(selection: &AssetSelection, policy: &GatePolicy) -> bool {
    if !selection.has_files() {
        return true;
    }
    policy.require_key
        && selection.selected_key.is_none()
        && selection.files().iter().any(|f| policy.needs_key(f))
}

/// Back gate of the extraction progress step
#[must_use]
pub fn progress_back_disabled(session: &ExtractionSession) -> bool {
    session.active
}

/// Evaluate a step's gates against the current data
#[must_use]
pub fn render_step(
    step: &Step,
    selection: &AssetSelection,
    session: &ExtractionSession,
    policy: &GatePolicy,
) -> RenderedStep {
    let (forward_disabled, back_disabled) = match step.kind {
        StepKind::Intro => (false, false),
        StepKind::AssetSelect => (asset_forward_disabled(selection, policy), false),
        StepKind::ExtractProgress => (false, progress_back_disabled(session)),
    };

    RenderedStep {
        kind: step.kind,
        forward_label: step.forward_label.clone(),
        forward_icon: step.forward_icon,
        forward_disabled,
        back_disabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(files: &[&str], key: Option<&str>) -> AssetSelection {
        let mut s = AssetSelection::new();
        s.replace_files(files.iter().map(ToString::to_string).collect());
        s.selected_key = key.map(ToString::to_string);
        s
    }

    #[test]
    fn test_empty_files_disable_forward() {
        let policy = GatePolicy::default();
        assert!(asset_forward_disabled(&selection(&[], None), &policy));
        assert!(asset_forward_disabled(&selection(&[], Some("prod.keys")), &policy));
    }

    #[test]
    fn test_key_required_until_selected() {
        let policy = GatePolicy::default();
        assert!(asset_forward_disabled(&selection(&["a.xci"], None), &policy));
        assert!(!asset_forward_disabled(
            &selection(&["a.xci"], Some("prod.keys")),
            &policy
        ));
    }

    #[test]
    fn test_key_rule_is_case_insensitive() {
        let policy = GatePolicy::default();
        assert!(asset_forward_disabled(&selection(&["GAME.NSP"], None), &policy));
        assert!(asset_forward_disabled(
            &selection(&["romfs.zip", "Update.Xci"], None),
            &policy
        ));
    }

    #[test]
    fn test_plain_archives_need_no_key() {
        let policy = GatePolicy::default();
        assert!(!asset_forward_disabled(
            &selection(&["romfs.zip", "dump.7z"], None),
            &policy
        ));
        assert!(!policy.needs_key("no_extension"));
    }

    #[test]
    fn test_key_rule_can_be_disabled() {
        let policy = GatePolicy {
            require_key: false,
            ..GatePolicy::default()
        };
        assert!(!asset_forward_disabled(&selection(&["a.xci"], None), &policy));
    }

    #[test]
    fn test_missing_files_are_advisory() {
        let policy = GatePolicy::default();
        let mut s = selection(&["romfs.zip"], None);
        s.missing_required_files = Some(vec!["MW_Model.pack".to_string()]);
        assert!(!asset_forward_disabled(&s, &policy));
    }

    #[test]
    fn test_gate_is_idempotent() {
        let policy = GatePolicy::default();
        let s = selection(&["a.xci", "b.zip"], None);
        let first = asset_forward_disabled(&s, &policy);
        for _ in 0..5 {
            assert_eq!(asset_forward_disabled(&s, &policy), first);
        }
    }

    #[test]
    fn test_progress_back_locked_while_active() {
        let mut session = ExtractionSession::new();
        assert!(!progress_back_disabled(&session));
        session.active = true;
        assert!(progress_back_disabled(&session));
    }

    #[test]
    fn test_render_step_applies_matching_gate() {
        let policy = GatePolicy::default();
        let mut session = ExtractionSession::new();
        session.active = true;
        let empty = AssetSelection::new();

        let intro = render_step(&Step::new(StepKind::Intro), &empty, &session, &policy);
        assert!(!intro.forward_disabled && !intro.back_disabled);

        let select = render_step(&Step::new(StepKind::AssetSelect), &empty, &session, &policy);
        assert!(select.forward_disabled);
        assert!(!select.back_disabled);

        let progress = render_step(
            &Step::new(StepKind::ExtractProgress),
            &empty,
            &session,
            &policy,
        );
        assert!(progress.back_disabled);
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("XCI"), ".xci");
        assert_eq!(normalize_extension(" .Nsp "), ".nsp");
    }
}
