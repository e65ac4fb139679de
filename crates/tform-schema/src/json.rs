//! # JSON Schema Sections
//!
//! Validation of a form data tree against a JSON Schema (Draft 2020-12)
//! using the `jsonschema` crate.
//!
//! ## Context placeholders
//!
//! Any schema node of the exact form `{"$context": "/pointer"}` is replaced by
//! the value found at that JSON pointer in the section context before the
//! schema is compiled:
//!
//! ```json
//! {"properties": {"type": {"enum": {"$context": "/experiment_engines"}}}}
//! ```
//!
//! A placeholder whose key is missing from the context is an internal failure
//! of the section, not a user error. Schemas without placeholders compile
//! once, at construction.
//!
//! ## Messages
//!
//! Violations carry the dot path of the offending field. `required` failures
//! are reported at the missing property itself rather than at its parent.
//! An `errorMessage` keyword on the schema node that failed replaces the
//! library message, either for every keyword (string) or per keyword
//! (object keyed by keyword name).

use std::fmt;

use async_trait::async_trait;
use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde_json::{Map, Value};
use tform_core::{FieldPath, Violation};

use crate::schema::{Schema, SchemaError, SchemaRejection};

/// Placeholder keyword resolved against the section context.
pub const CONTEXT_KEYWORD: &str = "$context";

/// Keyword carrying custom violation messages.
pub const ERROR_MESSAGE_KEYWORD: &str = "errorMessage";

/// A section schema backed by JSON Schema.
pub struct JsonSchema {
    source: Value,
    /// Present when the schema has no context placeholders.
    compiled: Option<Validator>,
}

impl JsonSchema {
    /// Build a schema, compiling it immediately unless it depends on context.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::ValidatorBuild`] if a context-free schema does
    /// not compile.
    pub fn new(schema: Value) -> Result<Self, SchemaError> {
        let compiled = if contains_placeholder(&schema) {
            None
        } else {
            Some(compile(&schema)?)
        };
        Ok(Self {
            source: schema,
            compiled,
        })
    }

    /// The schema document as given.
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Whether the schema is recompiled per validation from its context.
    pub fn is_context_dependent(&self) -> bool {
        self.compiled.is_none()
    }

    /// Every violation of `tree`, in the order the engine reports them.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaRejection::Internal`] when a placeholder cannot be
    /// resolved or the resolved schema does not compile.
    pub fn violations(&self, tree: &Value, context: &Value) -> Result<Vec<Violation>, SchemaRejection> {
        let resolved;
        let built;
        let (validator, schema) = match &self.compiled {
            Some(validator) => (validator, &self.source),
            None => {
                resolved = resolve_context(&self.source, context)?;
                tracing::trace!("compiling context-resolved schema");
                built = compile(&resolved)?;
                (&built, &resolved)
            }
        };
        Ok(validator
            .iter_errors(tree)
            .map(|error| to_violation(&error, schema))
            .collect())
    }
}

#[async_trait]
impl Schema for JsonSchema {
    async fn validate(&self, tree: &Value, context: &Value) -> Result<(), SchemaRejection> {
        let violations = self.violations(tree, context)?;
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaRejection::Invalid(violations))
        }
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("context_dependent", &self.is_context_dependent())
            .finish_non_exhaustive()
    }
}

fn compile(schema: &Value) -> Result<Validator, SchemaError> {
    let mut opts = jsonschema::options();
    opts.with_draft(jsonschema::Draft::Draft202012);
    opts.build(schema).map_err(|e| SchemaError::ValidatorBuild {
        reason: e.to_string(),
    })
}

fn to_violation(error: &ValidationError<'_>, schema: &Value) -> Violation {
    let mut path = FieldPath::from_pointer(&error.instance_path.to_string());
    if let ValidationErrorKind::Required { property } = &error.kind {
        if let Some(name) = property.as_str() {
            path.push(name);
        }
    }
    let message = custom_message(schema, &error.schema_path.to_string())
        .unwrap_or_else(|| error.to_string());
    Violation::new(path.to_normalized(), message)
}

/// Look up `errorMessage` on the schema node owning the failed keyword.
fn custom_message(schema: &Value, schema_path: &str) -> Option<String> {
    let (parent, keyword) = schema_path.rsplit_once('/')?;
    match schema.pointer(parent)?.get(ERROR_MESSAGE_KEYWORD)? {
        Value::String(message) => Some(message.clone()),
        Value::Object(by_keyword) => by_keyword.get(keyword)?.as_str().map(str::to_string),
        _ => None,
    }
}

fn placeholder(node: &Value) -> Option<&str> {
    match node {
        Value::Object(map) if map.len() == 1 => map.get(CONTEXT_KEYWORD)?.as_str(),
        _ => None,
    }
}

fn contains_placeholder(node: &Value) -> bool {
    if placeholder(node).is_some() {
        return true;
    }
    match node {
        Value::Object(map) => map.values().any(contains_placeholder),
        Value::Array(items) => items.iter().any(contains_placeholder),
        _ => false,
    }
}

fn resolve_context(node: &Value, context: &Value) -> Result<Value, SchemaRejection> {
    if let Some(reference) = placeholder(node) {
        let pointer = if reference.starts_with('/') {
            reference.to_string()
        } else {
            format!("/{reference}")
        };
        return context.pointer(&pointer).cloned().ok_or_else(|| {
            SchemaRejection::Internal(format!("schema context is missing '{reference}'"))
        });
    }
    Ok(match node {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| Ok((key.clone(), resolve_context(value, context)?)))
                .collect::<Result<Map<String, Value>, SchemaRejection>>()?,
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|value| resolve_context(value, context))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        other => other.clone(),
    })
}
