//! # Error Extraction
//!
//! Folds a flat violation list, as produced by a schema engine, into an
//! [`ErrorTree`]. Paths are normalized first, so violations reported as
//! `routes[0].id` and `routes.0.id` accumulate on the same node, in the
//! order they were encountered.

use serde::{Deserialize, Serialize};

use crate::error_tree::ErrorTree;
use crate::path::{normalize_path, FieldPath};

/// A single field-level violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Dot/bracket path of the violating field. Empty for the root.
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

impl Violation {
    /// Create a violation at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Build an error tree from a violation list.
pub fn extract_errors<'a>(violations: impl IntoIterator<Item = &'a Violation>) -> ErrorTree {
    violations
        .into_iter()
        .fold(ErrorTree::new(), |mut tree, violation| {
            let path = FieldPath::from_dotted(&normalize_path(&violation.path));
            tree.push(&path, violation.message.clone());
            tree
        })
}
