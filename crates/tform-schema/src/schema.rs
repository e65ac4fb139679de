//! # Schema Contract
//!
//! `validate(tree, context)` either resolves or rejects. A rejection is one of:
//!
//! - [`SchemaRejection::Invalid`]: the user's input broke one or more rules.
//!   Expected and recoverable; becomes error tree entries.
//! - [`SchemaRejection::Internal`]: the schema itself could not run (missing
//!   context key, uncompilable schema). Confined to the section that owns the
//!   schema.

use async_trait::async_trait;
use serde_json::Value;
use tform_core::Violation;
use thiserror::Error;

/// Why a schema rejected a tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaRejection {
    /// Field-level violations, in the order the schema reported them.
    #[error("{} violation(s)", .0.len())]
    Invalid(Vec<Violation>),

    /// The schema could not be evaluated.
    #[error("schema failure: {0}")]
    Internal(String),
}

impl SchemaRejection {
    /// The violations of an `Invalid` rejection; empty for `Internal`.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Invalid(violations) => violations.as_slice(),
            Self::Internal(_) => &[],
        }
    }
}

/// Error while constructing a schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The compiled validator could not be built (e.g., invalid schema).
    #[error("validator build error: {reason}")]
    ValidatorBuild {
        /// Reason reported by the schema engine.
        reason: String,
    },
}

impl From<SchemaError> for SchemaRejection {
    fn from(err: SchemaError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A validation schema for a whole form data tree.
#[async_trait]
pub trait Schema: Send + Sync {
    /// Validate `tree` with the section's `context`.
    ///
    /// # Errors
    ///
    /// Rejects with every violation found, or with an internal failure.
    async fn validate(&self, tree: &Value, context: &Value) -> Result<(), SchemaRejection>;
}

/// A schema backed by a plain synchronous closure.
pub struct FnSchema<F> {
    check: F,
}

impl<F> FnSchema<F>
where
    F: Fn(&Value, &Value) -> Result<(), SchemaRejection> + Send + Sync,
{
    /// Wrap `check` as a schema.
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

#[async_trait]
impl<F> Schema for FnSchema<F>
where
    F: Fn(&Value, &Value) -> Result<(), SchemaRejection> + Send + Sync,
{
    async fn validate(&self, tree: &Value, context: &Value) -> Result<(), SchemaRejection> {
        (self.check)(tree, context)
    }
}
