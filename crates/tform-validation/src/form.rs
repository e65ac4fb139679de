//! # Forms
//!
//! A [`Form`] puts one [`FormStore`] and one [`FormValidation`] side by side.
//! These are the two handles a UI layer receives: `data` and `on_change` from
//! the store, `errors`, `is_submitting` and `submit` from the validation.
//! They are passed explicitly; nothing here is global.

use std::sync::Arc;

use serde_json::Value;
use tform_core::{ErrorTree, PathSegment};
use tform_state::{FormStore, HandlerStack};
use tokio::task::JoinHandle;

use crate::definition::{DefinitionError, FormDefinition, ValidationConfig};
use crate::orchestrator::{FormValidation, SubmitOutcome};
use crate::section::Section;

/// A form data tree with its section validation.
#[derive(Debug)]
pub struct Form {
    store: FormStore,
    validation: Arc<FormValidation>,
    config: ValidationConfig,
    live: Option<JoinHandle<()>>,
}

impl Form {
    /// A form over `initial` (empty defaults or an existing entity).
    pub fn new(initial: Value, sections: Vec<Section>, config: ValidationConfig) -> Self {
        Self {
            store: FormStore::new(initial),
            validation: Arc::new(FormValidation::new(sections)),
            config,
            live: None,
        }
    }

    /// A form built from a declarative definition.
    pub fn from_definition(definition: FormDefinition, initial: Value) -> Result<Self, DefinitionError> {
        let config = definition.validation.clone();
        let sections = definition.into_sections()?;
        Ok(Self::new(initial, sections, config))
    }

    /// The data store.
    pub fn store(&self) -> &FormStore {
        &self.store
    }

    /// The section validation.
    pub fn validation(&self) -> &FormValidation {
        &self.validation
    }

    /// The validation settings.
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// The current data tree.
    pub fn data(&self) -> Arc<Value> {
        self.store.value()
    }

    /// The change handler for a field.
    pub fn on_change<S: Into<PathSegment>>(&self, segments: impl IntoIterator<Item = S>) -> HandlerStack {
        self.store.on_change(segments)
    }

    /// Error trees of the last settled pass, one per section.
    pub fn errors(&self) -> Vec<ErrorTree> {
        self.validation.errors()
    }

    /// Whether a submit is in progress.
    pub fn is_submitting(&self) -> bool {
        self.validation.is_submitting()
    }

    /// Start re-validating on every edit, if the configuration asks for it.
    /// Returns whether live validation is running.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start_live_validation(&mut self) -> bool {
        if !self.config.revalidate_on_change {
            return false;
        }
        if self.live.is_none() {
            let task = Arc::clone(&self.validation).watch_store(self.store.subscribe());
            self.live = Some(task);
        }
        true
    }

    /// Validate the current tree and, if valid, hand a copy of it to
    /// `on_valid` (e.g. as a request body).
    pub async fn submit<R>(&self, on_valid: impl FnOnce(Value) -> R) -> SubmitOutcome<R> {
        let tree = self.store.value();
        self.validation
            .submit(&tree, || on_valid(tree.as_ref().clone()))
            .await
    }
}

impl Drop for Form {
    fn drop(&mut self) {
        if let Some(task) = self.live.take() {
            task.abort();
        }
    }
}
