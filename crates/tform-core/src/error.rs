//! # Error Types
//!
//! Programming and path errors for the form engine. User input violations are
//! never represented here; they live in [`ErrorTree`](crate::ErrorTree)
//! entries next to the offending field.

use thiserror::Error;

/// Top-level error type for writes into a form data tree.
#[derive(Error, Debug)]
pub enum FormError {
    /// The target path could not be written.
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// A change handler outlived the store it was derived from.
    #[error("form store has been dropped; handler for '{path}' is detached")]
    StoreDropped {
        /// Path the detached handler was scoped to.
        path: String,
    },
}

/// Error while parsing or writing a field path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A path segment could not be parsed (e.g. `routes[x]`, `routes[1`).
    #[error("invalid path segment '{segment}' in '{raw}'")]
    InvalidSegment {
        /// The full raw path.
        raw: String,
        /// The offending segment.
        segment: String,
    },

    /// A write tried to descend through a value that cannot hold children.
    #[error("cannot write '{path}': segment '{segment}' meets a {found} value")]
    NotTraversable {
        /// The full path being written.
        path: String,
        /// The segment that could not be applied.
        segment: String,
        /// Kind of the value found at that point.
        found: &'static str,
    },

    /// A write addressed an array index above the supported maximum.
    #[error("cannot write '{path}': index {index} in '{segment}' exceeds {max}")]
    IndexOutOfRange {
        /// The full path being written.
        path: String,
        /// The segment carrying the index.
        segment: String,
        /// The requested index.
        index: usize,
        /// The largest index a write may address.
        max: usize,
    },
}
