use crate::types::{Cell, Row};

/// Builds a row from `(name, value)` pairs, keeping their order.
pub fn row<const N: usize>(values: [(&str, Cell); N]) -> Row {
    values.into_iter().collect()
}

/// Builds one row per entry, all sharing the column names in `names`.
///
/// # Panics
/// Panics if an entry does not have one value per name.
pub fn rows(names: &[&str], values: Vec<Vec<Cell>>) -> Vec<Row> {
    values
        .into_iter()
        .map(|values| {
            assert_eq!(values.len(), names.len(), "one value per column");
            names.iter().copied().zip(values).collect()
        })
        .collect()
}
