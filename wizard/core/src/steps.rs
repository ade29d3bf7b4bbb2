//! Wizard Steps
//!
//! Steps are plain data: what the page shows, how its forward button is
//! labelled, and what happens when the user advances past it. Whether a
//! button is enabled is never stored here; see [`crate::gates`].

use serde::{Deserialize, Serialize};

/// What a step page shows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Welcome text
    Intro,
    /// Archive and key selection
    AssetSelect,
    /// Extraction progress, log and result
    ExtractProgress,
}

impl StepKind {
    /// Short page title
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Intro => "Welcome",
            Self::AssetSelect => "Select game files",
            Self::ExtractProgress => "Extracting",
        }
    }
}

/// Symbol shown next to a forward label
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Icon {
    /// Arrow
    Next,
    /// Archive box
    Extract,
    /// Floppy disk
    Save,
}

/// Side effect attached to advancing past a step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceAction {
    /// Kick off the extraction job
    StartExtraction,
}

/// One page of the wizard
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Page content
    pub kind: StepKind,
    /// Forward button label (None = "Next")
    pub forward_label: Option<String>,
    /// Forward button icon
    pub forward_icon: Option<Icon>,
    /// Runs when the user advances past this step
    pub on_advance: Option<AdvanceAction>,
}

impl Step {
    /// A step with the default "Next" button and no side effect
    #[must_use]
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            forward_label: None,
            forward_icon: None,
            on_advance: None,
        }
    }

    /// Set the forward label
    #[must_use]
    pub fn with_forward_label(mut self, label: impl Into<String>) -> Self {
        self.forward_label = Some(label.into());
        self
    }

    /// Set the forward icon
    #[must_use]
    pub fn with_forward_icon(mut self, icon: Icon) -> Self {
        self.forward_icon = Some(icon);
        self
    }

    /// Attach an advance action
    #[must_use]
    pub fn with_on_advance(mut self, action: AdvanceAction) -> Self {
        self.on_advance = Some(action);
        self
    }
}

/// The standard intro → select → extract sequence
#[must_use]
pub fn default_steps() -> Vec<Step> {
    vec![
        Step::new(StepKind::Intro).with_forward_icon(Icon::Next),
        Step::new(StepKind::AssetSelect)
            .with_forward_label("Extract")
            .with_forward_icon(Icon::Extract)
            .with_on_advance(AdvanceAction::StartExtraction),
        Step::new(StepKind::ExtractProgress),
    ]
}

/// A step with its gating flags evaluated against live data
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedStep {
    /// Page content
    pub kind: StepKind,
    /// Forward button label as declared by the step
    pub forward_label: Option<String>,
    /// Forward button icon
    pub forward_icon: Option<Icon>,
    /// Forward is greyed out
    pub forward_disabled: bool,
    /// Back is greyed out
    pub back_disabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence() {
        let steps = default_steps();
        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Intro, StepKind::AssetSelect, StepKind::ExtractProgress]
        );
        assert_eq!(steps[1].forward_label.as_deref(), Some("Extract"));
        assert_eq!(steps[1].on_advance, Some(AdvanceAction::StartExtraction));
        assert!(steps[2].on_advance.is_none());
    }

    #[test]
    fn test_step_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StepKind::ExtractProgress).unwrap(),
            "\"extract_progress\""
        );
    }
}
