//! # Section Hosts
//!
//! Consumer-side drivers for the two ways a form lays out its sections.
//!
//! - [`AccordionHost`]: every section is shown at once. An invalid submit
//!   yields a scroll target (the first invalid section) and force-opens every
//!   section holding errors.
//! - [`WizardHost`]: one section per step. Each step has its own
//!   single-section validation; advancing is the submit of the current step
//!   and the last step's successful submit runs the real submit action.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use tform_core::ErrorTree;

use crate::orchestrator::{FormValidation, SchemaValidation, SubmitOutcome};
use crate::section::Section;

/// Display status of one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// No pass has settled yet.
    Unvalidated,
    /// The last pass found no errors in this section.
    Valid,
    /// The last pass found errors in this section.
    Invalid,
}

/// Where an accordion should scroll after an invalid submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrollTarget {
    /// Section index.
    pub index: usize,
    /// Section key, if it has one.
    pub key: Option<String>,
    /// Section title.
    pub title: String,
}

// ─── Accordion ───────────────────────────────────────────────────────

/// Host rendering all sections simultaneously.
#[derive(Debug)]
pub struct AccordionHost {
    validation: FormValidation,
    expanded: BTreeSet<usize>,
    scroll_target: Option<ScrollTarget>,
}

impl AccordionHost {
    /// Host the given orchestrator. All sections start collapsed.
    pub fn new(validation: FormValidation) -> Self {
        Self {
            validation,
            expanded: BTreeSet::new(),
            scroll_target: None,
        }
    }

    /// The orchestrator driving this host.
    pub fn validation(&self) -> &FormValidation {
        &self.validation
    }

    /// The hosted sections.
    pub fn sections(&self) -> &[Section] {
        self.validation.sections()
    }

    /// Toggle a section open or closed by the user. Returns whether it is now
    /// expanded by the user.
    pub fn toggle(&mut self, index: usize) -> bool {
        if self.expanded.remove(&index) {
            false
        } else {
            self.expanded.insert(index)
        }
    }

    /// Whether the section is shown open: expanded by the user, or holding
    /// errors.
    pub fn is_open(&self, index: usize) -> bool {
        self.expanded.contains(&index) || self.section_status(index) == SectionStatus::Invalid
    }

    /// Status of a section after the last settled pass.
    pub fn section_status(&self, index: usize) -> SectionStatus {
        let status = self.validation.status();
        if !status.run.validated {
            return SectionStatus::Unvalidated;
        }
        match status.errors.get(index) {
            Some(errors) if !errors.is_empty() => SectionStatus::Invalid,
            _ => SectionStatus::Valid,
        }
    }

    /// Errors of one section.
    pub fn section_errors(&self, index: usize) -> ErrorTree {
        self.validation
            .errors()
            .into_iter()
            .nth(index)
            .unwrap_or_default()
    }

    /// Whether the submit control should be disabled.
    pub fn is_submit_blocked(&self) -> bool {
        let status = self.validation.status();
        status.run.submitting || status.has_errors()
    }

    /// Validate and submit. On an invalid result, records the scroll target.
    pub async fn submit<R>(&mut self, tree: &Value, on_submit: impl FnOnce() -> R) -> SubmitOutcome<R> {
        let outcome = self.validation.submit(tree, on_submit).await;
        match &outcome {
            SubmitOutcome::Invalid { first_invalid } => {
                self.scroll_target = self.sections().get(*first_invalid).map(|section| ScrollTarget {
                    index: *first_invalid,
                    key: section.key().map(str::to_string),
                    title: section.title().to_string(),
                });
                tracing::debug!(scroll_to = ?self.scroll_target, "scrolling to first invalid section");
            }
            SubmitOutcome::Completed(_) => self.scroll_target = None,
            SubmitOutcome::Ignored => {}
        }
        outcome
    }

    /// The pending scroll target, if an invalid submit produced one.
    pub fn scroll_target(&self) -> Option<&ScrollTarget> {
        self.scroll_target.as_ref()
    }

    /// Consume the pending scroll target once the view has scrolled.
    pub fn take_scroll_target(&mut self) -> Option<ScrollTarget> {
        self.scroll_target.take()
    }
}

// ─── Wizard ──────────────────────────────────────────────────────────

/// Result of [`WizardHost::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardOutcome<R> {
    /// The current step was valid; now on the given step.
    Advanced {
        /// Index of the new current step.
        step: usize,
    },
    /// The last step was valid and the submit action ran.
    Submitted(R),
    /// The current step has errors; the wizard stays on it.
    Invalid,
    /// The current step is already being validated.
    Ignored,
}

/// Host rendering one section per step.
#[derive(Debug)]
pub struct WizardHost {
    steps: Vec<SchemaValidation>,
    current: usize,
}

impl WizardHost {
    /// A wizard with one step per section, starting at the first.
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            steps: sections.into_iter().map(SchemaValidation::new).collect(),
            current: 0,
        }
    }

    /// Index of the current step.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Whether the current step is the last one.
    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.steps.len()
    }

    /// The section of the current step.
    pub fn current_section(&self) -> Option<&Section> {
        self.steps.get(self.current).map(SchemaValidation::section)
    }

    /// Errors of the current step.
    pub fn current_errors(&self) -> ErrorTree {
        self.steps
            .get(self.current)
            .map(SchemaValidation::errors)
            .unwrap_or_default()
    }

    /// Whether the current step is being submitted.
    pub fn is_submitting(&self) -> bool {
        self.steps
            .get(self.current)
            .is_some_and(SchemaValidation::is_submitting)
    }

    /// Submit the current step. On the last step a valid result runs
    /// `on_submit`; otherwise it advances to the next step.
    pub async fn next<R>(&mut self, tree: &Value, on_submit: impl FnOnce() -> R) -> WizardOutcome<R> {
        let Some(step) = self.steps.get(self.current) else {
            return WizardOutcome::Submitted(on_submit());
        };
        if self.current + 1 >= self.steps.len() {
            let outcome = step.submit(tree, on_submit).await;
            return match outcome {
                SubmitOutcome::Completed(result) => WizardOutcome::Submitted(result),
                SubmitOutcome::Invalid { .. } => WizardOutcome::Invalid,
                SubmitOutcome::Ignored => WizardOutcome::Ignored,
            };
        }
        let outcome = step.submit(tree, || ()).await;
        match outcome {
            SubmitOutcome::Completed(()) => {
                self.current += 1;
                tracing::debug!(step = self.current, "wizard advanced");
                WizardOutcome::Advanced { step: self.current }
            }
            SubmitOutcome::Invalid { .. } => WizardOutcome::Invalid,
            SubmitOutcome::Ignored => WizardOutcome::Ignored,
        }
    }

    /// Go back one step without validating. Returns whether the step changed.
    pub fn back(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }
}
