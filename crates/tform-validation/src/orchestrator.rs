//! # Validation Orchestrator
//!
//! Runs one schema per section against the same form data tree and keeps
//! one error tree per section, index-aligned with the sections.
//!
//! ## States
//!
//! ```text
//!            submit()                    all settled, every tree empty
//! Idle ──────────────▶ Touched ──▶ Validating ──────────────▶ Valid ──▶ Idle
//!  │                                  ▲    │                  (completion callback)
//!  │ validate() / revalidate()        │    │ some tree non-empty
//!  └──────────────────────────────────┘    └──────────────────▶ Invalid ──▶ Idle
//! ```
//!
//! A pass validates every section concurrently and moves on only once all of
//! them have settled. Error trees are replaced wholesale by each pass.
//!
//! Only one pass runs at a time. A `submit()` while a pass is in flight is
//! ignored and reported as [`SubmitOutcome::Ignored`]; `validate()` and
//! `revalidate()` report [`ValidationStateError::PassInFlight`].
//!
//! A pass that never reaches its end (the future is dropped, or the
//! completion callback panics) still returns the orchestrator to Idle with
//! the submitting flag cleared. Error trees keep the last settled pass.
//!
//! ## Observers
//!
//! The current [`ValidationStatus`] is published on a `tokio::sync::watch`
//! channel. Hosts and UI layers read errors, phase and the submitting flag
//! from it instead of polling the orchestrator.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tform_core::ErrorTree;
use tform_state::FormSnapshot;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::section::Section;

// ─── Phases ──────────────────────────────────────────────────────────

/// Where the orchestrator is in its submit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationPhase {
    /// No pass in flight.
    Idle,
    /// A submit was requested; its pass is about to start.
    Touched,
    /// Section schemas are running.
    Validating,
    /// The last pass found no errors.
    Valid,
    /// The last pass found errors in at least one section.
    Invalid,
}

impl ValidationPhase {
    /// Whether the state machine allows moving from `self` to `to`.
    pub fn can_transition_to(self, to: ValidationPhase) -> bool {
        use ValidationPhase::*;
        matches!(
            (self, to),
            (Idle, Touched)
                | (Idle, Validating)
                | (Touched, Validating)
                | (Validating, Valid)
                | (Validating, Invalid)
                | (Valid, Idle)
                | (Invalid, Idle)
        )
    }
}

impl fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Touched => "TOUCHED",
            Self::Validating => "VALIDATING",
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
        };
        f.write_str(s)
    }
}

/// Flags describing the validation history of a form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    /// A submit has been requested at least once.
    pub touched: bool,
    /// At least one pass has settled.
    pub validated: bool,
    /// A submit is between its request and its return to Idle.
    pub submitting: bool,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by the validation state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationStateError {
    /// Attempted transition is not valid from the current phase.
    #[error("invalid validation transition: {from} -> {to}")]
    InvalidTransition {
        /// Current phase.
        from: ValidationPhase,
        /// Attempted target phase.
        to: ValidationPhase,
    },

    /// A pass was requested while another one is still running.
    #[error("a validation pass is already in flight")]
    PassInFlight,
}

// ─── Status ──────────────────────────────────────────────────────────

/// Snapshot of the orchestrator published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationStatus {
    /// Current phase.
    pub phase: ValidationPhase,
    /// Run flags.
    pub run: RunState,
    /// One error tree per section, in section order.
    pub errors: Vec<ErrorTree>,
    /// Number of passes settled so far.
    pub passes: u64,
}

impl ValidationStatus {
    fn idle(sections: usize) -> Self {
        Self {
            phase: ValidationPhase::Idle,
            run: RunState::default(),
            errors: vec![ErrorTree::new(); sections],
            passes: 0,
        }
    }

    fn transition(&mut self, to: ValidationPhase) -> Result<(), ValidationStateError> {
        if !self.phase.can_transition_to(to) {
            return Err(ValidationStateError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Index of the first section with a non-empty error tree.
    pub fn first_invalid_section(&self) -> Option<usize> {
        self.errors.iter().position(|tree| !tree.is_empty())
    }

    /// Whether any section holds errors.
    pub fn has_errors(&self) -> bool {
        self.first_invalid_section().is_some()
    }
}

/// Result of [`FormValidation::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome<R> {
    /// Every section passed; carries the completion callback's result.
    Completed(R),
    /// At least one section failed; the callback was not invoked.
    Invalid {
        /// First section, in section order, with errors.
        first_invalid: usize,
    },
    /// A pass was already in flight, or the pass could not settle; the
    /// callback was not invoked.
    Ignored,
}

impl<R> SubmitOutcome<R> {
    /// Whether the completion callback ran.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

// ─── Orchestrator ────────────────────────────────────────────────────

/// Validation state for an ordered list of sections.
pub struct FormValidation {
    sections: Vec<Section>,
    status: watch::Sender<ValidationStatus>,
}

impl FormValidation {
    /// An Idle orchestrator with one empty error tree per section.
    pub fn new(sections: Vec<Section>) -> Self {
        let (status, _) = watch::channel(ValidationStatus::idle(sections.len()));
        Self { sections, status }
    }

    /// The sections, in order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The current status.
    pub fn status(&self) -> ValidationStatus {
        self.status.borrow().clone()
    }

    /// Observe status changes.
    pub fn subscribe(&self) -> watch::Receiver<ValidationStatus> {
        self.status.subscribe()
    }

    /// The current phase.
    pub fn phase(&self) -> ValidationPhase {
        self.status.borrow().phase
    }

    /// The error trees of the last settled pass, in section order.
    pub fn errors(&self) -> Vec<ErrorTree> {
        self.status.borrow().errors.clone()
    }

    /// Whether a submit is in progress.
    pub fn is_submitting(&self) -> bool {
        self.status.borrow().run.submitting
    }

    /// Whether a submit has been requested at least once.
    pub fn is_touched(&self) -> bool {
        self.status.borrow().run.touched
    }

    /// First section, in section order, whose error tree is non-empty.
    pub fn first_invalid_section(&self) -> Option<usize> {
        self.status.borrow().first_invalid_section()
    }

    /// Validate `tree` and, if every section passes, invoke `on_valid` once.
    ///
    /// Errors stay populated after an invalid submit so they can be shown.
    pub async fn submit<R>(&self, tree: &Value, on_valid: impl FnOnce() -> R) -> SubmitOutcome<R> {
        let touched = self.update(|status| {
            status.transition(ValidationPhase::Touched)?;
            status.run.touched = true;
            status.run.submitting = true;
            Ok(())
        });
        if let Err(err) = touched {
            tracing::warn!(phase = %self.phase(), %err, "submit ignored");
            return SubmitOutcome::Ignored;
        }
        let _guard = PassGuard { validation: self };
        if let Err(err) = self.update(|status| status.transition(ValidationPhase::Validating)) {
            tracing::warn!(%err, "submit ignored");
            return SubmitOutcome::Ignored;
        }

        let outcome = match self.run_pass(tree).await {
            Ok(None) => SubmitOutcome::Completed(on_valid()),
            Ok(Some(first_invalid)) => SubmitOutcome::Invalid { first_invalid },
            Err(err) => {
                tracing::error!(%err, "validation pass could not settle, submit ignored");
                return SubmitOutcome::Ignored;
            }
        };
        self.finish();
        outcome
    }

    /// Run a pass without submitting and return the resulting error trees.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationStateError::PassInFlight`] if a pass is running,
    /// and [`ValidationStateError::InvalidTransition`] if the pass could not
    /// settle.
    pub async fn validate(&self, tree: &Value) -> Result<Vec<ErrorTree>, ValidationStateError> {
        self.update(|status| status.transition(ValidationPhase::Validating))
            .map_err(|_| ValidationStateError::PassInFlight)?;
        let _guard = PassGuard { validation: self };
        self.run_pass(tree).await?;
        self.finish();
        Ok(self.errors())
    }

    /// Re-run a pass so errors follow edits, but only once the form has been
    /// touched by a submit. Returns whether a pass ran.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationStateError::PassInFlight`] if a pass is running.
    pub async fn revalidate(&self, tree: &Value) -> Result<bool, ValidationStateError> {
        if !self.is_touched() {
            return Ok(false);
        }
        self.validate(tree).await?;
        Ok(true)
    }

    /// Wait until no pass is in flight.
    pub async fn settled(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|status| status.phase == ValidationPhase::Idle).await;
    }

    /// Re-validate every published snapshot of a store once the form is
    /// touched. Runs until the store is dropped.
    ///
    /// An edit that arrives while another pass is in flight is validated
    /// once that pass has settled, against the latest snapshot.
    ///
    /// Must be called within a Tokio runtime.
    pub fn watch_store(self: Arc<Self>, mut snapshots: watch::Receiver<FormSnapshot>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while snapshots.changed().await.is_ok() {
                loop {
                    let snapshot = snapshots.borrow_and_update().clone();
                    match self.revalidate(&snapshot.data).await {
                        Ok(ran) => {
                            tracing::trace!(version = snapshot.version, ran, "live re-validation");
                            break;
                        }
                        Err(ValidationStateError::PassInFlight) => {
                            tracing::debug!(version = snapshot.version, "live re-validation deferred");
                            self.settled().await;
                        }
                        Err(err) => {
                            tracing::error!(version = snapshot.version, %err, "live re-validation failed");
                            break;
                        }
                    }
                }
            }
            tracing::debug!("form store dropped, live validation stopped");
        })
    }

    /// Validate every section concurrently, publish the result and return
    /// the first invalid section. Must be entered in `Validating`.
    async fn run_pass(&self, tree: &Value) -> Result<Option<usize>, ValidationStateError> {
        tracing::debug!(sections = self.sections.len(), "validation pass started");
        let errors = join_all(self.sections.iter().map(|section| section.validate(tree))).await;

        let invalid = errors.iter().filter(|errors| !errors.is_empty()).count();
        let next = if invalid == 0 {
            ValidationPhase::Valid
        } else {
            ValidationPhase::Invalid
        };
        let settled = self.update(move |status| {
            status.transition(next)?;
            status.errors = errors;
            status.run.validated = true;
            status.passes += 1;
            Ok(status.first_invalid_section())
        });
        let first_invalid = settled?;
        tracing::debug!(invalid, first_invalid = ?first_invalid, "validation pass finished");
        Ok(first_invalid)
    }

    /// Return to Idle from Valid or Invalid.
    fn finish(&self) {
        let result = self.update(|status| {
            status.transition(ValidationPhase::Idle)?;
            status.run.submitting = false;
            Ok(())
        });
        if let Err(err) = result {
            tracing::error!(%err, "validation state out of sync");
        }
    }

    /// Force the status back to Idle after a pass that did not finish.
    fn abandon(&self) {
        self.status.send_if_modified(|status| {
            if status.phase == ValidationPhase::Idle {
                return false;
            }
            tracing::warn!(phase = %status.phase, "validation pass abandoned");
            status.phase = ValidationPhase::Idle;
            status.run.submitting = false;
            true
        });
    }

    /// Apply `change` to the status and publish it if it succeeded.
    fn update<T>(
        &self,
        change: impl FnOnce(&mut ValidationStatus) -> Result<T, ValidationStateError>,
    ) -> Result<T, ValidationStateError> {
        let mut result = Err(ValidationStateError::PassInFlight);
        self.status.send_if_modified(|status| {
            let mut draft = status.clone();
            result = change(&mut draft);
            if result.is_ok() {
                *status = draft;
            }
            result.is_ok()
        });
        result
    }
}

/// Returns the orchestrator to Idle when a pass is left before `finish`.
struct PassGuard<'a> {
    validation: &'a FormValidation,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.validation.abandon();
    }
}

impl fmt::Debug for FormValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormValidation")
            .field("sections", &self.sections)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

// ─── Single Section ──────────────────────────────────────────────────

/// A form validated by exactly one schema, exposing a single error tree.
#[derive(Debug)]
pub struct SchemaValidation {
    inner: FormValidation,
}

impl SchemaValidation {
    /// Validation for a single section.
    pub fn new(section: Section) -> Self {
        Self {
            inner: FormValidation::new(vec![section]),
        }
    }

    /// The section being validated.
    pub fn section(&self) -> &Section {
        &self.inner.sections()[0]
    }

    /// The error tree of the last settled pass.
    pub fn errors(&self) -> ErrorTree {
        self.inner.errors().into_iter().next().unwrap_or_default()
    }

    /// Whether a submit is in progress.
    pub fn is_submitting(&self) -> bool {
        self.inner.is_submitting()
    }

    /// See [`FormValidation::submit`].
    pub async fn submit<R>(&self, tree: &Value, on_valid: impl FnOnce() -> R) -> SubmitOutcome<R> {
        self.inner.submit(tree, on_valid).await
    }

    /// See [`FormValidation::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationStateError::PassInFlight`] if a pass is running.
    pub async fn validate(&self, tree: &Value) -> Result<ErrorTree, ValidationStateError> {
        self.inner.validate(tree).await?;
        Ok(self.errors())
    }

    /// See [`FormValidation::revalidate`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationStateError::PassInFlight`] if a pass is running.
    pub async fn revalidate(&self, tree: &Value) -> Result<bool, ValidationStateError> {
        self.inner.revalidate(tree).await
    }

    /// The underlying one-section orchestrator.
    pub fn as_form_validation(&self) -> &FormValidation {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tform_core::{FieldPath, Violation};
    use tform_schema::{FnSchema, RuleSchema, Schema, SchemaRejection};
    use tform_state::FormStore;

    fn always_reject() -> Section {
        Section::new("Rejects").with_schema(FnSchema::new(|_: &Value, _: &Value| {
            Err(SchemaRejection::Invalid(vec![Violation::new("name", "Name is required")]))
        }))
    }

    fn always_resolve() -> Section {
        Section::new("Resolves").with_schema(FnSchema::new(|_: &Value, _: &Value| Ok(())))
    }

    fn routes_section() -> Section {
        Section::new("Routes").with_schema(
            RuleSchema::new().min_items("config.routes", 1, "At least one route should be configured"),
        )
    }

    /// A schema that waits before resolving, to hold a pass in flight.
    struct Slow(Duration);

    #[async_trait::async_trait]
    impl Schema for Slow {
        async fn validate(&self, _: &Value, _: &Value) -> Result<(), SchemaRejection> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }

    // ─── State machine ───────────────────────────────────────────────

    #[test]
    fn test_phase_transition_table() {
        use ValidationPhase::*;
        assert!(Idle.can_transition_to(Touched));
        assert!(Touched.can_transition_to(Validating));
        assert!(Validating.can_transition_to(Invalid));
        assert!(Valid.can_transition_to(Idle));
        assert!(!Validating.can_transition_to(Touched));
        assert!(!Validating.can_transition_to(Validating));
        assert!(!Idle.can_transition_to(Valid));
        assert!(!Invalid.can_transition_to(Valid));
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut status = ValidationStatus::idle(1);
        let err = status.transition(ValidationPhase::Valid).unwrap_err();
        assert_eq!(
            err,
            ValidationStateError::InvalidTransition {
                from: ValidationPhase::Idle,
                to: ValidationPhase::Valid,
            }
        );
        assert_eq!(err.to_string(), "invalid validation transition: IDLE -> VALID");
        assert_eq!(status.phase, ValidationPhase::Idle);
    }

    #[test]
    fn test_initial_state() {
        let validation = FormValidation::new(vec![always_reject(), always_resolve()]);
        let status = validation.status();
        assert_eq!(status.phase, ValidationPhase::Idle);
        assert_eq!(status.run, RunState::default());
        assert_eq!(status.errors, vec![ErrorTree::new(), ErrorTree::new()]);
        assert_eq!(validation.first_invalid_section(), None);
    }

    // ─── Submit ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_isolation_between_sections() {
        let validation = FormValidation::new(vec![always_resolve(), always_reject(), always_resolve()]);
        let outcome = validation.submit(&json!({}), || "submitted").await;

        assert_eq!(outcome, SubmitOutcome::Invalid { first_invalid: 1 });
        let errors = validation.errors();
        assert!(errors[0].is_empty());
        assert_eq!(errors[1].to_value(), json!({"name": ["Name is required"]}));
        assert!(errors[2].is_empty());
    }

    #[tokio::test]
    async fn test_internal_failure_is_isolated() {
        let broken = Section::new("Broken").with_schema(
            RuleSchema::new().one_of_context("engine", "engines", "Unknown engine"),
        );
        let validation = FormValidation::new(vec![broken, routes_section()]);
        let tree = json!({"engine": "nop", "config": {"routes": [{"id": "a"}]}});
        let outcome = validation.submit(&tree, || ()).await;

        assert_eq!(outcome, SubmitOutcome::Invalid { first_invalid: 0 });
        let errors = validation.errors();
        assert_eq!(
            errors[0].messages_at(&FieldPath::root()),
            ["schema context is missing '/engines'".to_string()]
        );
        assert!(errors[1].is_empty());
        assert_eq!(validation.phase(), ValidationPhase::Idle);
    }

    #[tokio::test]
    async fn test_invalid_submit_returns_to_idle_without_callback() {
        let validation = FormValidation::new(vec![routes_section()]);
        let calls = AtomicUsize::new(0);
        let outcome = validation
            .submit(&json!({"config": {"routes": []}}), || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(outcome, SubmitOutcome::Invalid { first_invalid: 0 });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let status = validation.status();
        assert_eq!(status.phase, ValidationPhase::Idle);
        assert_eq!(
            status.run,
            RunState {
                touched: true,
                validated: true,
                submitting: false,
            }
        );
        assert_eq!(
            status.errors[0].to_value(),
            json!({"config": {"routes": ["At least one route should be configured"]}})
        );
    }

    #[tokio::test]
    async fn test_valid_submit_invokes_callback_once() {
        let validation = FormValidation::new(vec![routes_section(), Section::new("Review")]);
        let calls = AtomicUsize::new(0);
        let outcome = validation
            .submit(&json!({"config": {"routes": [{"id": "control"}]}}), || {
                calls.fetch_add(1, Ordering::SeqCst) + 1
            })
            .await;
        assert_eq!(outcome, SubmitOutcome::Completed(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(validation.errors().iter().all(ErrorTree::is_empty));
        assert!(!validation.is_submitting());
    }

    #[tokio::test]
    async fn test_revalidation_is_idempotent() {
        let validation = FormValidation::new(vec![routes_section(), always_reject()]);
        let tree = json!({"config": {"routes": []}});
        validation.submit(&tree, || ()).await;
        let first = validation.errors();
        validation.submit(&tree, || ()).await;
        assert_eq!(validation.errors(), first);
        assert_eq!(validation.status().passes, 2);
    }

    #[tokio::test]
    async fn test_observers_see_phases() {
        let validation = FormValidation::new(vec![always_reject()]);
        let mut rx = validation.subscribe();
        validation.submit(&json!({}), || ()).await;
        assert!(rx.has_changed().unwrap());
        let status = rx.borrow_and_update().clone();
        assert_eq!(status.phase, ValidationPhase::Idle);
        assert!(status.has_errors());
    }

    // ─── Re-entrancy ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_submit_while_validating_is_ignored() {
        let validation = FormValidation::new(vec![
            Section::new("Slow").with_schema(Slow(Duration::from_millis(50))),
        ]);
        let tree = json!({});
        let (first, second) = tokio::join!(
            validation.submit(&tree, || "first"),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                assert!(validation.is_submitting());
                validation.submit(&tree, || "second").await
            }
        );
        assert_eq!(first, SubmitOutcome::Completed("first"));
        assert_eq!(second, SubmitOutcome::Ignored);
        assert_eq!(validation.status().passes, 1);
    }

    #[tokio::test]
    async fn test_validate_while_validating_is_rejected() {
        let validation = FormValidation::new(vec![
            Section::new("Slow").with_schema(Slow(Duration::from_millis(50))),
        ]);
        let tree = json!({});
        let (first, second) = tokio::join!(validation.validate(&tree), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            validation.validate(&tree).await
        });
        assert!(first.is_ok());
        assert_eq!(second, Err(ValidationStateError::PassInFlight));
    }

    // ─── Abandoned passes ────────────────────────────────────────────

    #[tokio::test]
    async fn test_dropped_submit_returns_to_idle() {
        let validation = FormValidation::new(vec![
            Section::new("Slow").with_schema(Slow(Duration::from_millis(200))),
        ]);
        let tree = json!({});
        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), validation.submit(&tree, || "first")).await;
        assert!(timed_out.is_err());

        let status = validation.status();
        assert_eq!(status.phase, ValidationPhase::Idle);
        assert!(!status.run.submitting);
        assert_eq!(status.passes, 0);

        validation.settled().await;
        assert_eq!(
            validation.submit(&tree, || "second").await,
            SubmitOutcome::Completed("second")
        );
    }

    #[tokio::test]
    async fn test_dropped_validate_returns_to_idle() {
        let validation = FormValidation::new(vec![
            Section::new("Slow").with_schema(Slow(Duration::from_millis(200))),
        ]);
        let tree = json!({});
        assert!(tokio::time::timeout(Duration::from_millis(20), validation.validate(&tree))
            .await
            .is_err());
        assert_eq!(validation.phase(), ValidationPhase::Idle);
        assert!(validation.validate(&tree).await.is_ok());
    }

    #[tokio::test]
    async fn test_panicking_callback_returns_to_idle() {
        use futures::FutureExt;
        use std::panic::AssertUnwindSafe;

        let validation = FormValidation::new(vec![always_resolve()]);
        let tree = json!({});
        let panicked = AssertUnwindSafe(validation.submit(&tree, || -> u32 {
            panic!("completion failed")
        }))
        .catch_unwind()
        .await;
        assert!(panicked.is_err());

        let status = validation.status();
        assert_eq!(status.phase, ValidationPhase::Idle);
        assert!(!status.run.submitting);
        assert_eq!(validation.submit(&tree, || 7).await, SubmitOutcome::Completed(7));
    }

    #[tokio::test]
    async fn test_pass_outside_validating_fails_closed() {
        let validation = FormValidation::new(vec![always_resolve()]);
        let err = validation.run_pass(&json!({})).await.unwrap_err();
        assert_eq!(
            err,
            ValidationStateError::InvalidTransition {
                from: ValidationPhase::Idle,
                to: ValidationPhase::Valid,
            }
        );
        assert_eq!(validation.status().passes, 0);
    }

    // ─── Validate / revalidate ───────────────────────────────────────

    #[tokio::test]
    async fn test_validate_does_not_touch() {
        let validation = FormValidation::new(vec![routes_section()]);
        let errors = validation.validate(&json!({"config": {"routes": []}})).await.unwrap();
        assert!(!errors[0].is_empty());
        assert!(!validation.is_touched());
        assert!(!validation.is_submitting());
    }

    #[tokio::test]
    async fn test_revalidate_only_after_touch() {
        let validation = FormValidation::new(vec![routes_section()]);
        let empty = json!({"config": {"routes": []}});
        assert_eq!(validation.revalidate(&empty).await, Ok(false));
        assert_eq!(validation.status().passes, 0);

        validation.submit(&empty, || ()).await;
        assert_eq!(validation.first_invalid_section(), Some(0));

        let fixed = json!({"config": {"routes": [{"id": "control"}]}});
        assert_eq!(validation.revalidate(&fixed).await, Ok(true));
        assert_eq!(validation.first_invalid_section(), None);
    }

    #[tokio::test]
    async fn test_watch_store_tracks_edits_after_touch() {
        let store = FormStore::new(json!({"config": {"routes": []}}));
        let validation = Arc::new(FormValidation::new(vec![routes_section()]));
        let task = Arc::clone(&validation).watch_store(store.subscribe());

        validation.submit(&store.value(), || ()).await;
        assert_eq!(validation.first_invalid_section(), Some(0));

        let mut status = validation.subscribe();
        status.borrow_and_update();
        store
            .on_change(["config", "routes", "0", "id"])
            .call(json!("control"))
            .unwrap();
        let settled = status
            .wait_for(|s| s.phase == ValidationPhase::Idle && !s.has_errors())
            .await
            .unwrap()
            .clone();
        assert_eq!(settled.passes, 2);

        drop(store);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_store_retries_edit_made_during_submit() {
        let store = FormStore::new(json!({"config": {"routes": []}}));
        let validation = Arc::new(FormValidation::new(vec![
            routes_section(),
            Section::new("Slow").with_schema(Slow(Duration::from_millis(50))),
        ]));
        let task = Arc::clone(&validation).watch_store(store.subscribe());

        let tree = store.value();
        let (outcome, ()) = tokio::join!(validation.submit(&tree, || ()), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(validation.is_submitting());
            store
                .on_change(["config", "routes", "0", "id"])
                .call(json!("control"))
                .unwrap();
        });
        assert_eq!(outcome, SubmitOutcome::Invalid { first_invalid: 0 });

        let mut status = validation.subscribe();
        let settled = status
            .wait_for(|s| s.phase == ValidationPhase::Idle && !s.has_errors())
            .await
            .unwrap()
            .clone();
        assert_eq!(settled.passes, 2);

        drop(store);
        task.await.unwrap();
    }

    // ─── Single section ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_schema_validation_collapses_to_one_tree() {
        let validation = SchemaValidation::new(routes_section());
        assert!(validation.errors().is_empty());
        let outcome = validation.submit(&json!({"config": {"routes": []}}), || ()).await;
        assert_eq!(outcome, SubmitOutcome::Invalid { first_invalid: 0 });
        assert_eq!(
            validation.errors().messages_at(&FieldPath::parse("config.routes").unwrap()),
            ["At least one route should be configured".to_string()]
        );
        let cleared = validation
            .validate(&json!({"config": {"routes": [{"id": "a"}]}}))
            .await
            .unwrap();
        assert!(cleared.is_empty());
        assert_eq!(validation.section().title(), "Routes");
    }
}
