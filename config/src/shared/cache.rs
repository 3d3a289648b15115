use std::collections::HashMap;

use serde::Deserialize;

use crate::shared::{SourceConfig, ValidationError};

/// Declaration of one keyed cache.
///
/// A cache either owns a source and is built from it, or names another cache in `share_with`
/// and reuses that cache's index under its own suffix.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    pub name: String,
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub share_with: Option<String>,
    /// Key column, or list of key columns for a composite key.
    pub key: KeyConfig,
    /// Source column name to output column name substitutions.
    #[serde(default)]
    pub rename: HashMap<String, String>,
    /// Appended to every output column as `_{suffix}`.
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub aggregate: DuplicatePolicyConfig,
    #[serde(default)]
    pub normalize: KeyNormalizationConfig,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "caches.name".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        match (&self.source, &self.share_with) {
            (Some(source), None) => source.validate()?,
            (None, Some(_)) => {}
            _ => return Err(ValidationError::AmbiguousCacheSource(self.name.clone())),
        }

        self.key.validate(&format!("caches.{}.key", self.name))?;

        if let KeyNormalizationConfig::Prefix { length: 0 } = self.normalize {
            return Err(ValidationError::InvalidFieldValue {
                field: format!("caches.{}.normalize.prefix.length", self.name),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Column, or ordered columns, forming a join key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeyConfig {
    Single(String),
    Composite(Vec<String>),
}

impl KeyConfig {
    /// Returns the key columns in order.
    pub fn columns(&self) -> Vec<String> {
        match self {
            KeyConfig::Single(column) => vec![column.clone()],
            KeyConfig::Composite(columns) => columns.clone(),
        }
    }

    pub fn validate(&self, field: &str) -> Result<(), ValidationError> {
        let columns = self.columns();
        if columns.is_empty() || columns.iter().any(String::is_empty) {
            return Err(ValidationError::InvalidFieldValue {
                field: field.to_string(),
                constraint: "must name at least one non-empty column".to_string(),
            });
        }

        Ok(())
    }
}

/// How rows sharing a key are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicyConfig {
    #[default]
    LastWriteWins,
    Mean,
}

/// Normalization applied to text key parts at build and lookup time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyNormalizationConfig {
    #[default]
    None,
    Compact,
    FirstToken,
    Prefix { length: usize },
}
