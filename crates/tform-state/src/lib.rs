//! # tform-state — Form Data Binding
//!
//! Owns the single mutable data tree of a form and hands out path-scoped
//! change handlers so that nested sections can write to it without knowing
//! their full ancestor path.
//!
//! ## Components
//!
//! - **Handler stacks** (`handler.rs`): an immutable `(path, apply)` pair.
//!   `with_arg` appends a segment; `derive` does the same through a
//!   per-instance cache so that repeated derivations return the identical
//!   object.
//!
//! - **Form store** (`store.rs`): the one logical owner of the tree. Every
//!   write bumps a version, publishes a copy-on-write snapshot to observers,
//!   and installs a fresh root handler, which invalidates every derivation
//!   cache below it.
//!
//! ## Design
//!
//! There is no ambient context. Components that need the tree receive a
//! [`FormStore`] (or a [`HandlerStack`] scoped to their subtree) explicitly,
//! and observers subscribe to a `tokio::sync::watch` channel.

pub mod handler;
pub mod store;

pub use handler::{ApplyFn, HandlerStack};
pub use store::{FormSnapshot, FormStore};
