//! # tform-core — Foundational Types for the Form Engine
//!
//! This crate is the leaf of the tform workspace. It defines the pieces every
//! other crate builds on: field paths into JSON data trees, the nested error
//! tree that mirrors those paths, and the fold that turns a flat violation
//! list into that tree.
//!
//! ## Key Design Principles
//!
//! 1. **One path model.** `FieldPath` is the only way to address a location in
//!    a form data tree. Dot notation (`config.routes.0.id`) and bracket
//!    notation (`config.routes[0].id`) both parse into it, and
//!    [`normalize_path`] makes the two compare identically.
//!
//! 2. **Writes never lose structure silently.** [`set`] auto-vivifies missing
//!    containers, but walking *through* an existing scalar is a
//!    [`PathError::NotTraversable`], not a no-op. A failed write changes
//!    nothing, and array indices are bounded by [`MAX_ARRAY_INDEX`].
//!
//! 3. **Errors mirror data.** An [`ErrorTree`] has the same shape as the data
//!    it describes, so a leaf component can look up its own messages with the
//!    same path it writes to.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `tform-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod error_tree;
pub mod extract;
pub mod path;

pub use error::{FormError, PathError};
pub use error_tree::ErrorTree;
pub use extract::{extract_errors, Violation};
pub use path::{get, normalize_path, set, FieldPath, PathSegment, MAX_ARRAY_INDEX};
