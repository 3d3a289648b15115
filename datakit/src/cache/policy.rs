//! Column naming, duplicate-key and collision rules shared by caches and the assembler.

use std::collections::{HashMap, HashSet};

use config::shared::{CollisionPolicyConfig, DuplicatePolicyConfig};

use crate::bail;
use crate::error::{DataKitResult, ErrorKind};
use crate::types::{Cell, Row};

/// How a cache combines source rows that share a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// The last row seen for a key replaces earlier ones.
    #[default]
    LastWriteWins,
    /// Every value column holds the running mean of the numeric values seen for the key. Rows
    /// with a null value column are skipped.
    RunningMean,
}

impl From<DuplicatePolicyConfig> for DuplicatePolicy {
    fn from(config: DuplicatePolicyConfig) -> Self {
        match config {
            DuplicatePolicyConfig::LastWriteWins => DuplicatePolicy::LastWriteWins,
            DuplicatePolicyConfig::Mean => DuplicatePolicy::RunningMean,
        }
    }
}

/// What happens when a binding writes a column the event row already carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Overlapping output columns between bindings are rejected when the assembler is created,
    /// and a clash with an event column fails the row.
    #[default]
    Reject,
    /// The cache value replaces the existing one.
    Overwrite,
}

impl From<CollisionPolicyConfig> for CollisionPolicy {
    fn from(config: CollisionPolicyConfig) -> Self {
        match config {
            CollisionPolicyConfig::Reject => CollisionPolicy::Reject,
            CollisionPolicyConfig::Overwrite => CollisionPolicy::Overwrite,
        }
    }
}

/// Value columns of a source schema: every column except the key columns, in source order.
///
/// Returns the source positions of the value columns and their names after `rename`.
pub fn value_columns<'a>(
    source_names: impl IntoIterator<Item = &'a str>,
    key_columns: &[String],
    rename: &HashMap<String, String>,
) -> DataKitResult<(Vec<usize>, Vec<String>)> {
    let mut positions = Vec::new();
    let mut names = Vec::new();
    let mut seen = HashSet::new();

    for (position, name) in source_names.into_iter().enumerate() {
        if key_columns.iter().any(|key| key == name) {
            continue;
        }

        let renamed = rename.get(name).map(String::as_str).unwrap_or(name);
        if !seen.insert(renamed.to_string()) {
            bail!(
                ErrorKind::ConfigError,
                "Cache output column is declared twice",
                format!("column `{renamed}` after renaming `{name}`")
            );
        }

        positions.push(position);
        names.push(renamed.to_string());
    }

    Ok((positions, names))
}

/// Appends `_{suffix}` to every name when a suffix is configured.
pub fn derive_output_names(names: &[String], suffix: Option<&str>) -> Vec<String> {
    match suffix {
        Some(suffix) => names
            .iter()
            .map(|name| format!("{name}_{suffix}"))
            .collect(),
        None => names.to_vec(),
    }
}

/// Sets every column in `names` that is not in `skip` to [`Cell::Null`].
pub fn impute_missing(row: &mut Row, names: &[String], skip: &[String]) {
    for name in names {
        if !skip.contains(name) {
            row.set(name.as_str(), Cell::Null);
        }
    }
}

/// Merges a lookup result into `row`.
///
/// A hit writes the cached values, a miss writes nulls; in both cases columns named in `skip`
/// are left alone so every row ends up with the same set of columns.
pub fn merge_lookup(
    row: &mut Row,
    names: &[String],
    values: Option<&[Cell]>,
    skip: &[String],
    collision: CollisionPolicy,
) -> DataKitResult<()> {
    if collision == CollisionPolicy::Reject
        && let Some(name) = names
            .iter()
            .find(|name| !skip.contains(*name) && row.contains(name))
    {
        bail!(
            ErrorKind::ConfigError,
            "Cache column collides with an event column",
            format!("column `{name}`")
        );
    }

    let Some(values) = values else {
        impute_missing(row, names, skip);
        return Ok(());
    };

    for (name, value) in names.iter().zip(values) {
        if !skip.contains(name) {
            row.set(name.as_str(), value.clone());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn key_columns_are_not_values() {
        let (positions, names) =
            value_columns(["id", "genre", "score"], &names(&["id"]), &HashMap::new()).unwrap();

        assert_eq!(positions, vec![1, 2]);
        assert_eq!(names, vec!["genre", "score"]);
    }

    #[test]
    fn rename_applies_before_suffix() {
        let rename = HashMap::from([("score".to_string(), "rating".to_string())]);
        let (_, raw) = value_columns(["id", "score"], &names(&["id"]), &rename).unwrap();

        assert_eq!(derive_output_names(&raw, Some("a")), vec!["rating_a"]);
        assert_eq!(derive_output_names(&raw, None), vec!["rating"]);
    }

    #[test]
    fn rename_onto_existing_column_is_rejected() {
        let rename = HashMap::from([("a".to_string(), "b".to_string())]);

        let err = value_columns(["id", "a", "b"], &names(&["id"]), &rename).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn miss_imputes_nulls_except_skipped() {
        let mut row: Row = [("user_id", Cell::I64(9))].into_iter().collect();

        merge_lookup(
            &mut row,
            &names(&["user_id", "genre"]),
            None,
            &names(&["user_id"]),
            CollisionPolicy::Reject,
        )
        .unwrap();

        assert_eq!(row.get("user_id"), Some(&Cell::I64(9)));
        assert_eq!(row.get("genre"), Some(&Cell::Null));
    }

    #[test]
    fn collisions_follow_policy() {
        let mut row: Row = [("id", Cell::I64(1)), ("genre", Cell::from("old"))]
            .into_iter()
            .collect();
        let values = [Cell::from("new")];

        let err = merge_lookup(
            &mut row.clone(),
            &names(&["genre"]),
            Some(&values),
            &[],
            CollisionPolicy::Reject,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        merge_lookup(
            &mut row,
            &names(&["genre"]),
            Some(&values),
            &[],
            CollisionPolicy::Overwrite,
        )
        .unwrap();
        assert_eq!(row.get("genre"), Some(&Cell::from("new")));
    }
}
