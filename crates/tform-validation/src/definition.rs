//! # Form Definitions
//!
//! Declarative form configuration loaded from YAML or JSON:
//!
//! ```yaml
//! sections:
//!   - key: routes
//!     title: Routes
//!     schema:
//!       type: object
//!       properties:
//!         config:
//!           properties:
//!             routes:
//!               type: array
//!               minItems: 1
//!               errorMessage:
//!                 minItems: At least one route should be configured
//!   - key: experiments
//!     title: Experiments
//!     context:
//!       experiment_engines: [nop, standard]
//!     schema:
//!       properties:
//!         engine:
//!           enum: {$context: /experiment_engines}
//!   - title: Review
//! validation:
//!   revalidate_on_change: true
//! ```
//!
//! Each `schema` is a JSON Schema document compiled into a [`JsonSchema`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tform_schema::{JsonSchema, SchemaError};
use thiserror::Error;

use crate::section::Section;

/// Errors loading or compiling a form definition.
#[derive(Error, Debug)]
pub enum DefinitionError {
    /// Definition file could not be read.
    #[error("failed to read form definition {path}: {source}")]
    Io {
        /// The file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// File extension is neither YAML nor JSON.
    #[error("unsupported form definition format: {path}")]
    UnsupportedFormat {
        /// The file path.
        path: PathBuf,
    },

    /// YAML parse failure.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse failure.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Two sections share a key.
    #[error("duplicate section key '{key}'")]
    DuplicateKey {
        /// The repeated key.
        key: String,
    },

    /// A section schema failed to compile.
    #[error("schema for section '{section}' is invalid: {source}")]
    Schema {
        /// Title of the section.
        section: String,
        /// Underlying schema error.
        source: SchemaError,
    },
}

/// Validation behaviour of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Re-run validation on every edit once the form has been submitted.
    #[serde(default = "default_revalidate_on_change")]
    pub revalidate_on_change: bool,
}

fn default_revalidate_on_change() -> bool {
    true
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            revalidate_on_change: default_revalidate_on_change(),
        }
    }
}

/// One section of a form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDefinition {
    /// Stable identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Display title.
    pub title: String,
    /// JSON Schema for the whole form tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    /// Validation context.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub context: Value,
}

/// A complete form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    /// Sections in display order.
    pub sections: Vec<SectionDefinition>,
    /// Validation behaviour.
    #[serde(default)]
    pub validation: ValidationConfig,
}

impl FormDefinition {
    /// Parse a YAML definition.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DefinitionError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a JSON definition.
    pub fn from_json_str(json: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a definition from a `.yaml`, `.yml` or `.json` file.
    pub fn from_path(path: &Path) -> Result<Self, DefinitionError> {
        let content = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(DefinitionError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Compile every section schema.
    pub fn into_sections(self) -> Result<Vec<Section>, DefinitionError> {
        let mut keys = HashSet::new();
        for key in self.sections.iter().filter_map(|s| s.key.as_deref()) {
            if !keys.insert(key) {
                return Err(DefinitionError::DuplicateKey {
                    key: key.to_string(),
                });
            }
        }
        self.sections
            .into_iter()
            .map(SectionDefinition::into_section)
            .collect()
    }
}

impl SectionDefinition {
    fn into_section(self) -> Result<Section, DefinitionError> {
        let mut section = Section::new(self.title).with_context(self.context);
        if let Some(key) = self.key {
            section = section.with_key(key);
        }
        if let Some(schema) = self.schema {
            let schema = JsonSchema::new(schema).map_err(|source| DefinitionError::Schema {
                section: section.title().to_string(),
                source,
            })?;
            section = section.with_schema(schema);
        }
        Ok(section)
    }
}
