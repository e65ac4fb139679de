//! # Sections
//!
//! A section is one unit of validation and display: an accordion panel or a
//! wizard step. It validates the *whole* form data tree against its own
//! schema and context, so cross-field rules may look anywhere in the tree.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tform_core::{extract_errors, ErrorTree};
use tform_schema::{Schema, SchemaRejection};

/// One schema/context/display unit of a form.
#[derive(Clone)]
pub struct Section {
    key: Option<String>,
    title: String,
    schema: Option<Arc<dyn Schema>>,
    context: Value,
}

impl Section {
    /// A section without a schema. It is always valid.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            key: None,
            title: title.into(),
            schema: None,
            context: Value::Null,
        }
    }

    /// Set the stable identifier used by hosts and definitions.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attach a schema.
    pub fn with_schema(self, schema: impl Schema + 'static) -> Self {
        self.with_shared_schema(Arc::new(schema))
    }

    /// Attach a schema shared with other sections.
    pub fn with_shared_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the auxiliary data the schema resolves cross-field rules against.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// The section key, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The validation context.
    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Whether this section validates anything.
    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }

    /// Validate `tree` and fold the outcome into an error tree.
    ///
    /// Never fails: an internal schema failure or a panic inside the schema
    /// becomes a root-level message of this section's tree.
    pub async fn validate(&self, tree: &Value) -> ErrorTree {
        let Some(schema) = &self.schema else {
            return ErrorTree::new();
        };
        match AssertUnwindSafe(schema.validate(tree, &self.context))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => ErrorTree::new(),
            Ok(Err(SchemaRejection::Invalid(violations))) => extract_errors(&violations),
            Ok(Err(SchemaRejection::Internal(reason))) => {
                tracing::error!(section = %self.title, %reason, "schema failed to evaluate");
                ErrorTree::with_root_message(reason)
            }
            Err(panic) => {
                let reason = format!("schema panicked: {}", panic_message(panic.as_ref()));
                tracing::error!(section = %self.title, %reason, "schema failed to evaluate");
                ErrorTree::with_root_message(reason)
            }
        }
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("key", &self.key)
            .field("title", &self.title)
            .field("has_schema", &self.has_schema())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
