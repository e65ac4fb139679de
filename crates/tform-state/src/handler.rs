//! # Handler Stacks
//!
//! A handler stack carries the path accumulated so far and a terminal
//! `apply(path, value)` function. Calling it writes `value` at that path.
//!
//! ```text
//! root ([])                    apply(["config","routes","0","id"], "control")
//!  └─ derive("config")                          ▲
//!      └─ derive("routes")                      │
//!          └─ derive("0")                       │
//!              └─ derive("id") ── call("control")
//! ```
//!
//! Stacks are never mutated. `with_arg` always builds a new stack; `derive`
//! returns a cached child, so two derivations of the same segment from the
//! same parent are the same object. Each stack owns its own cache, which
//! makes the cache disappear together with its parent: once the store
//! installs a fresh root, everything derived from the old root is no longer
//! reachable through it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tform_core::{FieldPath, FormError, PathSegment};

/// Terminal write function shared by every stack derived from one root.
pub type ApplyFn = dyn Fn(&FieldPath, Value) -> Result<(), FormError> + Send + Sync;

/// A path-scoped change handler.
///
/// Cloning is cheap and preserves identity ([`HandlerStack::ptr_eq`]).
#[derive(Clone)]
pub struct HandlerStack {
    inner: Arc<HandlerInner>,
}

struct HandlerInner {
    path: FieldPath,
    apply: Arc<ApplyFn>,
    derived: Mutex<HashMap<PathSegment, HandlerStack>>,
}

impl HandlerStack {
    /// Create a stack at `path` with its own `apply` function.
    pub fn new<F>(path: FieldPath, apply: F) -> Self
    where
        F: Fn(&FieldPath, Value) -> Result<(), FormError> + Send + Sync + 'static,
    {
        Self::with_apply(path, Arc::new(apply))
    }

    /// Create a stack at `path` sharing an existing `apply` function.
    pub fn with_apply(path: FieldPath, apply: Arc<ApplyFn>) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                path,
                apply,
                derived: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The accumulated path.
    pub fn path(&self) -> &FieldPath {
        &self.inner.path
    }

    /// Write `value` at the accumulated path.
    ///
    /// # Errors
    ///
    /// Propagates whatever the terminal `apply` reports, e.g. a
    /// [`FormError::Path`] when the path runs through a scalar.
    pub fn call(&self, value: Value) -> Result<(), FormError> {
        (self.inner.apply)(&self.inner.path, value)
    }

    /// A new, uncached stack with `segment` appended.
    pub fn with_arg(&self, segment: impl Into<PathSegment>) -> HandlerStack {
        Self::with_apply(self.inner.path.join(segment), Arc::clone(&self.inner.apply))
    }

    /// The child stack for `segment`, built once per parent instance.
    pub fn derive(&self, segment: impl Into<PathSegment>) -> HandlerStack {
        let segment = segment.into();
        let mut derived = self.inner.derived.lock();
        derived
            .entry(segment)
            .or_insert_with_key(|segment| self.with_arg(segment.clone()))
            .clone()
    }

    /// Derive along every segment of `path`.
    pub fn derive_path(&self, path: &FieldPath) -> HandlerStack {
        path.segments()
            .iter()
            .fold(self.clone(), |stack, segment| stack.derive(segment.clone()))
    }

    /// Whether `self` and `other` are the same stack object.
    pub fn ptr_eq(&self, other: &HandlerStack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether both stacks write through the same `apply` function.
    pub fn shares_apply(&self, other: &HandlerStack) -> bool {
        Arc::ptr_eq(&self.inner.apply, &other.inner.apply)
    }

    /// Number of children currently cached on this stack.
    pub fn cached_children(&self) -> usize {
        self.inner.derived.lock().len()
    }
}

impl fmt::Debug for HandlerStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerStack")
            .field("path", &self.inner.path.to_string())
            .finish_non_exhaustive()
    }
}
