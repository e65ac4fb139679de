//! # tform-schema — Schema Contract & Adapters
//!
//! A form section validates the *whole* data tree against one schema plus an
//! auxiliary context object (allowed option lists, engine names, and other
//! cross-field rule data). This crate defines that contract and two
//! implementations.
//!
//! ## Contract (`schema.rs`)
//!
//! [`Schema::validate`] resolves when the tree is valid and rejects with
//! either the full list of field-level violations or an internal failure.
//! Implementations must collect every violation rather than stopping at the
//! first one.
//!
//! ## JSON Schema (`json.rs`)
//!
//! [`JsonSchema`] validates with the `jsonschema` crate (Draft 2020-12).
//! `{"$context": "/pointer"}` placeholders are substituted from the section
//! context before compilation, and an `errorMessage` keyword on the failing
//! schema node overrides the library message.
//!
//! ## Rules (`rules.rs`)
//!
//! [`RuleSchema`] expresses checks that are awkward in JSON Schema: minimum
//! list sizes with product-specific messages, membership in a context list,
//! and arbitrary cross-field closures. Rule paths accept `*` to fan out over
//! list elements.

pub mod json;
pub mod rules;
pub mod schema;

pub use json::JsonSchema;
pub use rules::{RuleOutcome, RuleSchema};
pub use schema::{FnSchema, Schema, SchemaError, SchemaRejection};
