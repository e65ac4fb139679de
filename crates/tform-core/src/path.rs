//! # Field Paths
//!
//! Addressing of locations inside a form data tree (`serde_json::Value`).
//!
//! ## Syntax
//!
//! Paths are written in dot notation with optional bracket-index suffixes:
//!
//! ```text
//! config.routes[0].timeout     -> Key(config) Key(routes) Index(0) Key(timeout)
//! config.routes.0.timeout      -> Key(config) Key(routes) Key(0) Key(timeout)
//! ```
//!
//! Empty segments (leading, trailing or doubled dots) are dropped.
//! [`normalize_path`] rewrites the bracket form to the dot form so that both
//! compare identically once tokenized on `.`.
//!
//! ## Segment semantics
//!
//! | segment | existing array | existing object | missing / `null` | other scalar |
//! |---|---|---|---|---|
//! | `Key("routes")` | error | key lookup | vivified `{}` | error |
//! | `Key("0")` | index 0 | key `"0"` | vivified `{}` | error |
//! | `Index(0)` | index 0 | wrapped `[obj]` | vivified `[]` | wrapped `[scalar]` |
//!
//! Wrapping applies to writes only. The wrapped value sits at index 0, so a
//! write to index 0 replaces it and a write to any other index keeps it.
//! Writing past the end of an array pads with `null`, up to
//! [`MAX_ARRAY_INDEX`]. A write that fails anywhere along the path changes
//! nothing.
//!
//! A zero-length path addresses the root: [`get`] returns the tree and
//! [`set`] replaces it.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::PathError;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// A dot segment. Indexes arrays when it is numeric.
    Key(String),
    /// A bracket index. Coerces non-array values into arrays on write.
    Index(usize),
}

impl PathSegment {
    /// The segment in normalized (pure dot) form.
    pub fn as_token(&self) -> String {
        match self {
            Self::Key(key) => key.clone(),
            Self::Index(index) => index.to_string(),
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, Self::Key(key) if key.is_empty())
    }

    fn array_index(&self) -> Option<usize> {
        match self {
            Self::Key(key) => parse_index(key),
            Self::Index(index) => Some(*index),
        }
    }

    fn empty_container(&self) -> Value {
        match self {
            Self::Key(_) => Value::Object(Map::new()),
            Self::Index(_) => Value::Array(Vec::new()),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<&String> for PathSegment {
    fn from(key: &String) -> Self {
        Self::Key(key.clone())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An ordered sequence of path segments.
///
/// Keys containing `.` or `[` cannot be expressed in the string form; build
/// such paths from segments instead of parsing them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The zero-length path addressing the tree root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from segments, dropping empty keys.
    pub fn new(segments: impl IntoIterator<Item = PathSegment>) -> Self {
        Self(segments.into_iter().filter(|s| !s.is_blank()).collect())
    }

    /// Parse dot/bracket notation.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::InvalidSegment`] for unbalanced or non-numeric
    /// brackets such as `routes[x]` or `routes[1`.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for part in raw.split('.').filter(|p| !p.is_empty()) {
            let invalid = || PathError::InvalidSegment {
                raw: raw.to_string(),
                segment: part.to_string(),
            };
            let (key, mut rest) = match part.find('[') {
                Some(open) => part.split_at(open),
                None => (part, ""),
            };
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            while !rest.is_empty() {
                let inner = rest.strip_prefix('[').ok_or_else(invalid)?;
                let close = inner.find(']').ok_or_else(invalid)?;
                let index = parse_index(&inner[..close]).ok_or_else(invalid)?;
                segments.push(PathSegment::Index(index));
                rest = &inner[close + 1..];
            }
        }
        Ok(Self(segments))
    }

    /// Split an already-normalized dot path into key segments. Never fails.
    pub fn from_dotted(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|p| !p.is_empty())
                .map(PathSegment::from)
                .collect(),
        )
    }

    /// Convert a JSON pointer (`/config/routes/0`) into key segments.
    pub fn from_pointer(pointer: &str) -> Self {
        Self(
            pointer
                .split('/')
                .skip(1)
                .filter(|token| !token.is_empty())
                .map(|token| PathSegment::Key(token.replace("~1", "/").replace("~0", "~")))
                .collect(),
        )
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a segment in place. Empty keys are ignored.
    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        let segment = segment.into();
        if !segment.is_blank() {
            self.0.push(segment);
        }
    }

    /// A new path with `segment` appended.
    pub fn join(&self, segment: impl Into<PathSegment>) -> Self {
        let mut joined = self.clone();
        joined.push(segment);
        joined
    }

    /// A new path with all of `other`'s segments appended.
    pub fn concat(&self, other: &FieldPath) -> Self {
        let mut joined = self.clone();
        joined.0.extend(other.0.iter().cloned());
        joined
    }

    /// Pure dot notation (`config.routes.0.timeout`).
    pub fn to_normalized(&self) -> String {
        self.0
            .iter()
            .map(PathSegment::as_token)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 && matches!(segment, PathSegment::Key(_)) {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for FieldPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into))
    }
}

/// Rewrite `name[idx]` segments to `name.idx` and drop empty segments.
///
/// Malformed brackets are left untouched. Idempotent.
pub fn normalize_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) if parse_index(&after[..close]).is_some() => {
                out.push_str(&rest[..open]);
                out.push('.');
                out.push_str(&after[..close]);
                rest = &after[close + 1..];
            }
            _ => {
                out.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out.split('.')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Read the value at `path`.
///
/// Returns `None` as soon as an intermediate node is missing, `null`, or a
/// scalar. A `null` leaf is returned as `Some(&Value::Null)`.
pub fn get<'a>(tree: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut node = tree;
    for segment in path.segments() {
        node = match node {
            Value::Object(map) => map.get(&segment.as_token())?,
            Value::Array(items) => items.get(segment.array_index()?)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Largest array index a write may address. Writes past the end pad with
/// `null`, so the limit bounds the allocation a single write can cause.
pub const MAX_ARRAY_INDEX: usize = 65_535;

/// Write `value` at `path`, creating missing containers on the way.
///
/// Mutates `tree` in place. A zero-length path replaces the whole tree.
/// The whole path is checked before anything is written, so a failed write
/// leaves `tree` untouched.
///
/// # Errors
///
/// Returns [`PathError::NotTraversable`] when a key segment meets an existing
/// scalar, or a non-numeric key meets an array, and
/// [`PathError::IndexOutOfRange`] for an array index above
/// [`MAX_ARRAY_INDEX`].
pub fn set(tree: &mut Value, path: &FieldPath, value: Value) -> Result<(), PathError> {
    check_writable(tree, path)?;
    let mut node = tree;
    for segment in path.segments() {
        node = step_mut(node, segment, path)?;
    }
    *node = value;
    Ok(())
}

/// Walk `path` read-only and report the first segment [`set`] would fail on.
fn check_writable(tree: &Value, path: &FieldPath) -> Result<(), PathError> {
    // `None` once the walk has left the existing tree; everything below is
    // vivified and only index limits apply.
    let mut node = Some(tree).filter(|n| !n.is_null());
    for segment in path.segments() {
        node = match (segment, node) {
            (PathSegment::Index(index), current) => {
                check_index(path, segment, *index)?;
                match current {
                    Some(Value::Array(items)) => items.get(*index),
                    // A wrapped value sits at index 0.
                    Some(other) if *index == 0 => Some(other),
                    _ => None,
                }
            }
            (PathSegment::Key(_), None) => None,
            (PathSegment::Key(key), Some(Value::Object(map))) => map.get(key),
            (PathSegment::Key(key), Some(Value::Array(items))) => match parse_index(key) {
                Some(index) => {
                    check_index(path, segment, index)?;
                    items.get(index)
                }
                None => return Err(not_traversable(path, segment, "array")),
            },
            (PathSegment::Key(_), Some(other)) => {
                return Err(not_traversable(path, segment, kind(other)))
            }
        }
        .filter(|n| !n.is_null());
    }
    Ok(())
}

/// Descend one segment for writing, returning the (possibly new) child slot.
fn step_mut<'a>(
    node: &'a mut Value,
    segment: &PathSegment,
    path: &FieldPath,
) -> Result<&'a mut Value, PathError> {
    if node.is_null() {
        *node = segment.empty_container();
    }
    match segment {
        PathSegment::Key(key) => match node {
            Value::Object(map) => Ok(map.entry(key.clone()).or_insert(Value::Null)),
            Value::Array(items) => match parse_index(key) {
                Some(index) => slot_mut(items, index, path, segment),
                None => Err(not_traversable(path, segment, "array")),
            },
            other => Err(not_traversable(path, segment, kind(other))),
        },
        PathSegment::Index(index) => {
            coerce_array(node);
            match node {
                Value::Array(items) => slot_mut(items, *index, path, segment),
                other => Err(not_traversable(path, segment, kind(other))),
            }
        }
    }
}

/// Wrap a non-array value into a one-element array.
fn coerce_array(node: &mut Value) {
    if node.is_array() {
        return;
    }
    let wrapped = match node.take() {
        Value::Null => Vec::new(),
        other => vec![other],
    };
    *node = Value::Array(wrapped);
}

fn slot_mut<'a>(
    items: &'a mut Vec<Value>,
    index: usize,
    path: &FieldPath,
    segment: &PathSegment,
) -> Result<&'a mut Value, PathError> {
    check_index(path, segment, index)?;
    if index >= items.len() {
        let len = index
            .checked_add(1)
            .ok_or_else(|| index_out_of_range(path, segment, index))?;
        items.resize(len, Value::Null);
    }
    Ok(&mut items[index])
}

fn check_index(path: &FieldPath, segment: &PathSegment, index: usize) -> Result<(), PathError> {
    if index > MAX_ARRAY_INDEX {
        return Err(index_out_of_range(path, segment, index));
    }
    Ok(())
}

fn index_out_of_range(path: &FieldPath, segment: &PathSegment, index: usize) -> PathError {
    PathError::IndexOutOfRange {
        path: path.to_string(),
        segment: segment.to_string(),
        index,
        max: MAX_ARRAY_INDEX,
    }
}

fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn not_traversable(path: &FieldPath, segment: &PathSegment, found: &'static str) -> PathError {
    PathError::NotTraversable {
        path: path.to_string(),
        segment: segment.to_string(),
        found,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
