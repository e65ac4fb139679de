//! # Error Trees
//!
//! Validation messages arranged in the same nested shape as the form data
//! tree. A node may carry its own messages and named children; keys are
//! normalized path tokens, so `routes[0]` and `routes.0` land on the same node.
//!
//! ## JSON shape
//!
//! ```text
//! {}                                       no errors
//! {"config": {"routes": ["At least one route should be configured"]}}
//! ["schema context is missing 'engines'"]  messages on the root only
//! {"routes": {"_errors": ["..."], "0": {"id": ["..."]}}}
//! ```
//!
//! A node with only messages serializes as an array, a node with children as
//! an object. A node with both keeps its own messages under `_errors`.
//!
//! `_errors` is reserved: a path segment with that name addresses the
//! enclosing node itself, so `routes._errors` and `routes` are the same node
//! and no child can be serialized under the reserved key.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::path::FieldPath;

/// Key under which a node's own messages are serialized when it also has
/// children. Never used as a child key.
pub const SELF_ERRORS_KEY: &str = "_errors";

/// Nested validation messages for one form section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorTree {
    messages: Vec<String>,
    children: BTreeMap<String, ErrorTree>,
}

impl ErrorTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// A tree holding a single message on its root node.
    pub fn with_root_message(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            children: BTreeMap::new(),
        }
    }

    /// Whether no node in the tree holds a message.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.children.values().all(ErrorTree::is_empty)
    }

    /// Total number of messages in the tree.
    pub fn message_count(&self) -> usize {
        self.messages.len()
            + self
                .children
                .values()
                .map(ErrorTree::message_count)
                .sum::<usize>()
    }

    /// Messages attached directly to this node.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Named children of this node.
    pub fn children(&self) -> &BTreeMap<String, ErrorTree> {
        &self.children
    }

    /// The subtree at `path`, if any message was recorded at or below it.
    pub fn get(&self, path: &FieldPath) -> Option<&ErrorTree> {
        let mut node = self;
        for token in child_tokens(path) {
            node = node.children.get(&token)?;
        }
        Some(node)
    }

    /// Messages recorded exactly at `path`. Empty when there are none.
    pub fn messages_at(&self, path: &FieldPath) -> &[String] {
        self.get(path).map(|node| node.messages()).unwrap_or(&[])
    }

    /// Whether any message was recorded at or below `path`.
    pub fn has_errors_at(&self, path: &FieldPath) -> bool {
        self.get(path).is_some_and(|node| !node.is_empty())
    }

    /// Append a message at `path`, creating intermediate nodes.
    pub fn push(&mut self, path: &FieldPath, message: impl Into<String>) {
        let mut node = self;
        for token in child_tokens(path) {
            node = node.children.entry(token).or_default();
        }
        node.messages.push(message.into());
    }

    /// Every node that holds messages, as `(normalized path, messages)` in
    /// depth-first key order.
    pub fn entries(&self) -> Vec<(String, &[String])> {
        let mut out = Vec::new();
        self.collect_entries(&mut Vec::new(), &mut out);
        out
    }

    fn collect_entries<'a>(&'a self, prefix: &mut Vec<&'a str>, out: &mut Vec<(String, &'a [String])>) {
        if !self.messages.is_empty() {
            out.push((prefix.join("."), self.messages.as_slice()));
        }
        for (key, child) in &self.children {
            prefix.push(key);
            child.collect_entries(prefix, out);
            prefix.pop();
        }
    }

    /// The nested JSON representation described in the module docs.
    pub fn to_value(&self) -> Value {
        let as_messages = || Value::Array(self.messages.iter().cloned().map(Value::String).collect());
        if self.children.is_empty() && !self.messages.is_empty() {
            return as_messages();
        }
        let mut map = Map::new();
        if !self.messages.is_empty() {
            map.insert(SELF_ERRORS_KEY.to_string(), as_messages());
        }
        for (key, child) in &self.children {
            map.insert(key.clone(), child.to_value());
        }
        Value::Object(map)
    }
}

/// Child keys along `path`, skipping the reserved self-messages key.
fn child_tokens(path: &FieldPath) -> impl Iterator<Item = String> + '_ {
    path.segments()
        .iter()
        .map(|segment| segment.as_token())
        .filter(|token| token != SELF_ERRORS_KEY)
}

impl Serialize for ErrorTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
