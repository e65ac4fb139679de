//! # Rule Schemas
//!
//! A programmatic schema built from per-field rules and cross-field checks.
//!
//! Rule paths use dot notation. A `*` segment (or `[*]`) fans out over every
//! element of an array or every entry of an object, so
//! `config.routes.*.id` checks the `id` of each configured route. A wildcard
//! over a missing container expands to nothing.
//!
//! Every rule runs on every validation; violations are collected in rule
//! order. A rule that cannot be evaluated (e.g. its context list is missing)
//! aborts the whole schema with [`SchemaRejection::Internal`].

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tform_core::{get, normalize_path, FieldPath, Violation};

use crate::schema::{Schema, SchemaRejection};

/// Result of checking one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The field satisfies the rule.
    Pass,
    /// The field violates the rule; the message is shown next to it.
    Fail(String),
    /// The rule could not be evaluated.
    Error(String),
}

type FieldCheck = dyn Fn(Option<&Value>, &Value) -> RuleOutcome + Send + Sync;
type TreeCheck = dyn Fn(&Value, &Value) -> Result<Vec<Violation>, String> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternToken {
    Key(String),
    Any,
}

enum Rule {
    Field {
        pattern: Vec<PatternToken>,
        check: Box<FieldCheck>,
    },
    Tree(Box<TreeCheck>),
}

/// A schema assembled from rules.
#[derive(Default)]
pub struct RuleSchema {
    rules: Vec<Rule>,
}

impl RuleSchema {
    /// An empty schema; accepts every tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules were added.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check the value at every match of `path` with `check`, which also
    /// receives the section context.
    pub fn field<F>(mut self, path: &str, check: F) -> Self
    where
        F: Fn(Option<&Value>, &Value) -> RuleOutcome + Send + Sync + 'static,
    {
        self.rules.push(Rule::Field {
            pattern: parse_pattern(path),
            check: Box::new(check),
        });
        self
    }

    /// The field must be present, non-null and not an empty string.
    pub fn required(self, path: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        self.field(path, move |value, _| match value {
            None | Some(Value::Null) => RuleOutcome::Fail(message.clone()),
            Some(Value::String(s)) if s.trim().is_empty() => RuleOutcome::Fail(message.clone()),
            Some(_) => RuleOutcome::Pass,
        })
    }

    /// The field must be an array with at least `min` elements.
    pub fn min_items(self, path: &str, min: usize, message: impl Into<String>) -> Self {
        let message = message.into();
        self.field(path, move |value, _| match value {
            Some(Value::Array(items)) if items.len() >= min => RuleOutcome::Pass,
            _ => RuleOutcome::Fail(message.clone()),
        })
    }

    /// When present, the field must equal one of the values in the context
    /// array at `context_pointer`.
    pub fn one_of_context(
        self,
        path: &str,
        context_pointer: &str,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let pointer = if context_pointer.starts_with('/') {
            context_pointer.to_string()
        } else {
            format!("/{context_pointer}")
        };
        self.field(path, move |value, context| {
            let Some(value) = value.filter(|v| !v.is_null()) else {
                return RuleOutcome::Pass;
            };
            match context.pointer(&pointer) {
                Some(Value::Array(allowed)) if allowed.contains(value) => RuleOutcome::Pass,
                Some(Value::Array(_)) => RuleOutcome::Fail(message.clone()),
                Some(_) => RuleOutcome::Error(format!("schema context '{pointer}' is not a list")),
                None => RuleOutcome::Error(format!("schema context is missing '{pointer}'")),
            }
        })
    }

    /// When present, the field must satisfy `predicate`.
    pub fn predicate<P>(self, path: &str, message: impl Into<String>, predicate: P) -> Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let message = message.into();
        self.field(path, move |value, _| match value {
            Some(value) if !value.is_null() && !predicate(value) => {
                RuleOutcome::Fail(message.clone())
            }
            _ => RuleOutcome::Pass,
        })
    }

    /// A check over the whole tree, for rules spanning several fields.
    ///
    /// Returning `Err` marks the schema as failed to evaluate.
    pub fn custom<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<Vec<Violation>, String> + Send + Sync + 'static,
    {
        self.rules.push(Rule::Tree(Box::new(check)));
        self
    }

    /// Every violation of `tree`, in rule order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaRejection::Internal`] from the first rule that could
    /// not be evaluated.
    pub fn violations(&self, tree: &Value, context: &Value) -> Result<Vec<Violation>, SchemaRejection> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            match rule {
                Rule::Field { pattern, check } => {
                    for path in expand(tree, pattern) {
                        match check(get(tree, &path), context) {
                            RuleOutcome::Pass => {}
                            RuleOutcome::Fail(message) => {
                                violations.push(Violation::new(path.to_normalized(), message));
                            }
                            RuleOutcome::Error(reason) => {
                                return Err(SchemaRejection::Internal(reason));
                            }
                        }
                    }
                }
                Rule::Tree(check) => {
                    violations.extend(check(tree, context).map_err(SchemaRejection::Internal)?);
                }
            }
        }
        Ok(violations)
    }
}

#[async_trait]
impl Schema for RuleSchema {
    async fn validate(&self, tree: &Value, context: &Value) -> Result<(), SchemaRejection> {
        let violations = self.violations(tree, context)?;
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaRejection::Invalid(violations))
        }
    }
}

impl fmt::Debug for RuleSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSchema")
            .field("rules", &self.rules.len())
            .finish()
    }
}

fn parse_pattern(raw: &str) -> Vec<PatternToken> {
    normalize_path(&raw.replace("[*]", ".*"))
        .split('.')
        .filter(|token| !token.is_empty())
        .map(|token| match token {
            "*" => PatternToken::Any,
            key => PatternToken::Key(key.to_string()),
        })
        .collect()
}

/// Concrete paths in `tree` matching `pattern`.
fn expand(tree: &Value, pattern: &[PatternToken]) -> Vec<FieldPath> {
    pattern
        .iter()
        .fold(vec![FieldPath::root()], |paths, token| match token {
            PatternToken::Key(key) => paths.into_iter().map(|p| p.join(key.as_str())).collect(),
            PatternToken::Any => paths
                .into_iter()
                .flat_map(|p| {
                    let children: Vec<String> = match get(tree, &p) {
                        Some(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
                        Some(Value::Object(map)) => map.keys().cloned().collect(),
                        _ => Vec::new(),
                    };
                    children.into_iter().map(move |child| p.join(child))
                })
                .collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn route_rules() -> RuleSchema {
        RuleSchema::new()
            .min_items("config.routes", 1, "At least one route should be configured")
            .required("config.routes.*.id", "Route ID is required")
            .predicate("config.routes[*].timeout", "Timeout must end in ms or s", |v| {
                v.as_str()
                    .is_some_and(|s| s.ends_with("ms") || s.ends_with('s'))
            })
    }

    #[test]
    fn test_pattern_parsing() {
        assert_eq!(
            parse_pattern("config.routes[*].id"),
            vec![
                PatternToken::Key("config".into()),
                PatternToken::Key("routes".into()),
                PatternToken::Any,
                PatternToken::Key("id".into()),
            ]
        );
        assert_eq!(
            parse_pattern("a[0]..b"),
            vec![
                PatternToken::Key("a".into()),
                PatternToken::Key("0".into()),
                PatternToken::Key("b".into()),
            ]
        );
    }

    #[test]
    fn test_min_items_on_empty_routes() {
        let violations = route_rules()
            .violations(&json!({"config": {"routes": []}}), &Value::Null)
            .unwrap();
        assert_eq!(
            violations,
            vec![Violation::new(
                "config.routes",
                "At least one route should be configured"
            )]
        );
    }

    #[test]
    fn test_wildcard_checks_every_element() {
        let tree = json!({"config": {"routes": [
            {"id": "control", "timeout": "100ms"},
            {"id": "", "timeout": "forever"},
            {"timeout": "2s"}
        ]}});
        let violations = route_rules().violations(&tree, &Value::Null).unwrap();
        assert_eq!(
            violations,
            vec![
                Violation::new("config.routes.1.id", "Route ID is required"),
                Violation::new("config.routes.2.id", "Route ID is required"),
                Violation::new("config.routes.1.timeout", "Timeout must end in ms or s"),
            ]
        );
    }

    #[test]
    fn test_wildcard_over_object_entries() {
        let schema = RuleSchema::new().required("labels.*", "Label value is required");
        let violations = schema
            .violations(&json!({"labels": {"team": "x", "owner": null}}), &Value::Null)
            .unwrap();
        assert_eq!(violations, vec![Violation::new("labels.owner", "Label value is required")]);
    }

    #[test]
    fn test_wildcard_over_missing_container_is_empty() {
        let schema = RuleSchema::new().required("config.routes.*.id", "Route ID is required");
        assert!(schema.violations(&json!({}), &Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_one_of_context() {
        let schema = RuleSchema::new().one_of_context(
            "config.experiment_engine.type",
            "experiment_engines",
            "Unknown experiment engine",
        );
        let context = json!({"experiment_engines": ["nop", "standard"]});
        let tree = |engine: &str| json!({"config": {"experiment_engine": {"type": engine}}});

        assert!(schema.violations(&tree("nop"), &context).unwrap().is_empty());
        assert_eq!(
            schema.violations(&tree("custom"), &context).unwrap(),
            vec![Violation::new(
                "config.experiment_engine.type",
                "Unknown experiment engine"
            )]
        );
        assert!(schema.violations(&json!({}), &context).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_of_context_without_list_is_internal() {
        let schema = RuleSchema::new().one_of_context("engine", "/engines", "Unknown engine");
        let err = schema
            .validate(&json!({"engine": "nop"}), &json!({}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SchemaRejection::Internal("schema context is missing '/engines'".into())
        );
        let err = schema
            .validate(&json!({"engine": "nop"}), &json!({"engines": "nop"}))
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaRejection::Internal(_)));
    }

    #[test]
    fn test_custom_cross_field_rule() {
        let schema = RuleSchema::new().custom(|tree, _| {
            let Some(default) = tree["config"]["default_route_id"].as_str() else {
                return Ok(Vec::new());
            };
            let known = tree["config"]["routes"]
                .as_array()
                .is_some_and(|routes| routes.iter().any(|r| r["id"] == default));
            Ok(if known {
                Vec::new()
            } else {
                vec![Violation::new(
                    "config.default_route_id",
                    "Default route must be one of the configured routes",
                )]
            })
        });
        let valid = json!({"config": {"routes": [{"id": "a"}], "default_route_id": "a"}});
        let invalid = json!({"config": {"routes": [{"id": "a"}], "default_route_id": "b"}});
        assert!(schema.violations(&valid, &Value::Null).unwrap().is_empty());
        assert_eq!(schema.violations(&invalid, &Value::Null).unwrap().len(), 1);
    }

    #[test]
    fn test_custom_rule_error_is_internal() {
        let schema = RuleSchema::new()
            .required("name", "Name is required")
            .custom(|_, _| Err("lookup table unavailable".into()));
        assert_eq!(
            schema.violations(&json!({}), &Value::Null),
            Err(SchemaRejection::Internal("lookup table unavailable".into()))
        );
    }

    #[tokio::test]
    async fn test_validate_resolves_and_rejects() {
        let schema = route_rules();
        let valid = json!({"config": {"routes": [{"id": "control", "timeout": "1s"}]}});
        assert!(schema.validate(&valid, &Value::Null).await.is_ok());

        let err = schema
            .validate(&json!({"config": {}}), &Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(schema.len(), 3);
        assert!(RuleSchema::new().is_empty());
    }
}
