//! # Form State Store
//!
//! The single logical owner of a form data tree.
//!
//! ## Write path
//!
//! ```text
//! leaf handler ── call(value) ──▶ root apply ──▶ set(tree, path, value)
//!                                              ├─ version += 1
//!                                              ├─ publish snapshot (watch)
//!                                              └─ install fresh root handler
//! ```
//!
//! The tree lives in an `Arc<Value>` inside the watch channel. A write
//! mutates it in place when nobody else holds it, and clones it first when
//! an earlier [`FormSnapshot`] is still alive, so captured snapshots keep
//! their old values. Change detection compares versions, never pointers.
//!
//! ## Concurrency
//!
//! The watch channel's lock and the root-handler mutex are held only for the
//! duration of a write, never across `.await`. Do not call a handler while
//! holding a `Receiver::borrow()` guard on the same thread.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tform_core::{get, set, FieldPath, FormError, PathSegment};
use tokio::sync::watch;

use crate::handler::{ApplyFn, HandlerStack};

/// A published state of the form data tree.
#[derive(Debug, Clone)]
pub struct FormSnapshot {
    /// Incremented on every successful write. Starts at 0.
    pub version: u64,
    /// The tree as of this version.
    pub data: Arc<Value>,
}

/// Owner of a form data tree.
///
/// Cloning shares the same store.
#[derive(Clone)]
pub struct FormStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    snapshots: watch::Sender<FormSnapshot>,
    apply: Arc<ApplyFn>,
    root: Mutex<HandlerStack>,
}

impl FormStore {
    /// Create a store around an initial tree (empty defaults or an existing
    /// entity).
    pub fn new(initial: Value) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<StoreInner>| {
            let weak = weak.clone();
            let apply: Arc<ApplyFn> = Arc::new(move |path: &FieldPath, value: Value| {
                let inner = weak.upgrade().ok_or_else(|| FormError::StoreDropped {
                    path: path.to_string(),
                })?;
                inner.write(path, value)
            });
            let (snapshots, _) = watch::channel(FormSnapshot {
                version: 0,
                data: Arc::new(initial),
            });
            StoreInner {
                snapshots,
                root: Mutex::new(HandlerStack::with_apply(FieldPath::root(), Arc::clone(&apply))),
                apply,
            }
        });
        Self { inner }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> FormSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// The current tree.
    pub fn value(&self) -> Arc<Value> {
        Arc::clone(&self.inner.snapshots.borrow().data)
    }

    /// The current version.
    pub fn version(&self) -> u64 {
        self.inner.snapshots.borrow().version
    }

    /// A copy of the value at `path`, if present.
    pub fn get(&self, path: &FieldPath) -> Option<Value> {
        get(&self.value(), path).cloned()
    }

    /// The current root handler. Replaced after every successful write.
    pub fn root_handler(&self) -> HandlerStack {
        self.inner.root.lock().clone()
    }

    /// The handler for the given path, derived through the current root's
    /// cache.
    pub fn on_change<S: Into<PathSegment>>(
        &self,
        segments: impl IntoIterator<Item = S>,
    ) -> HandlerStack {
        segments
            .into_iter()
            .fold(self.root_handler(), |stack, segment| stack.derive(segment))
    }

    /// Observe published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<FormSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Replace the whole tree.
    ///
    /// # Errors
    ///
    /// Never fails for a live store; the signature matches handler calls.
    pub fn reset(&self, value: Value) -> Result<(), FormError> {
        self.root_handler().call(value)
    }

    /// Hand the tree over to the caller, e.g. as a request body on submit.
    pub fn into_value(self) -> Value {
        self.value().as_ref().clone()
    }
}

impl StoreInner {
    fn write(&self, path: &FieldPath, value: Value) -> Result<(), FormError> {
        let mut outcome = Ok(());
        self.snapshots.send_if_modified(|snapshot| {
            // `set` checks the whole path first, so a failed write leaves
            // the published tree as it was.
            match set(Arc::make_mut(&mut snapshot.data), path, value) {
                Ok(()) => {
                    snapshot.version += 1;
                    true
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });
        outcome?;

        *self.root.lock() = HandlerStack::with_apply(FieldPath::root(), Arc::clone(&self.apply));
        tracing::trace!(path = %path, version = self.snapshots.borrow().version, "form data updated");
        Ok(())
    }
}

impl fmt::Debug for FormStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormStore")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}
