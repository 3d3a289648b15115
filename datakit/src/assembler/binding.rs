use std::slice;
use std::sync::Arc;

use config::shared::KeyConfig;

use crate::bail;
use crate::cache::{CollisionPolicy, KeyedCache, policy};
use crate::error::{DataKitResult, ErrorKind};
use crate::types::{JoinKey, Row};

/// Event columns whose current values form a lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelector {
    Single(String),
    Composite(Vec<String>),
}

impl KeySelector {
    pub fn single(column: impl Into<String>) -> Self {
        KeySelector::Single(column.into())
    }

    pub fn composite<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeySelector::Composite(columns.into_iter().map(Into::into).collect())
    }

    pub fn columns(&self) -> &[String] {
        match self {
            KeySelector::Single(column) => slice::from_ref(column),
            KeySelector::Composite(columns) => columns,
        }
    }
}

impl From<&str> for KeySelector {
    fn from(column: &str) -> Self {
        KeySelector::single(column)
    }
}

impl From<KeyConfig> for KeySelector {
    fn from(config: KeyConfig) -> Self {
        match config {
            KeyConfig::Single(column) => KeySelector::Single(column),
            KeyConfig::Composite(columns) => KeySelector::Composite(columns),
        }
    }
}

/// One join step: look the selector's values up in `cache` and merge the result into the row.
#[derive(Debug, Clone)]
pub struct Binding {
    selector: KeySelector,
    cache: Arc<KeyedCache>,
}

impl Binding {
    pub fn new(selector: impl Into<KeySelector>, cache: Arc<KeyedCache>) -> Self {
        Self {
            selector: selector.into(),
            cache,
        }
    }

    pub fn selector(&self) -> &KeySelector {
        &self.selector
    }

    pub fn cache(&self) -> &KeyedCache {
        &self.cache
    }

    /// Output columns this binding writes: the cache outputs that are not selector columns.
    pub fn written_columns(&self) -> impl Iterator<Item = &String> {
        let selector = self.selector.columns();
        self.cache
            .output_names()
            .iter()
            .filter(move |name| !selector.contains(*name))
    }

    pub(crate) fn apply(&self, row: &mut Row, collision: CollisionPolicy) -> DataKitResult<()> {
        let columns = self.selector.columns();
        let Some(key) = JoinKey::from_row(row, columns) else {
            let missing: Vec<&str> = columns
                .iter()
                .filter(|column| !row.contains(column))
                .map(String::as_str)
                .collect();
            bail!(
                ErrorKind::MissingKeyColumn,
                "Event row lacks a key column",
                format!("missing {}", missing.join(", "))
            );
        };

        let values = self.cache.lookup(&key)?;
        policy::merge_lookup(row, self.cache.output_names(), values, columns, collision)
    }
}
