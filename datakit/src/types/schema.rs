use crate::bail;
use crate::error::{DataKitResult, ErrorKind};
use crate::types::{CellKind, Row};

/// Name and observed kind of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    /// `None` until a non-null value has been seen in this column.
    pub kind: Option<CellKind>,
}

/// Column layout of a source, fixed by the first row it produces.
///
/// Later rows must carry the same columns in the same order, and every non-null value must
/// agree with the kind first observed for its column. Anything else is reported as a
/// [`ErrorKind::MalformedRow`] instead of being coerced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowSchema {
    columns: Vec<ColumnSchema>,
}

impl RowSchema {
    /// Derives the schema from the first row of a source.
    pub fn from_row(row: &Row) -> Self {
        let columns = row
            .iter()
            .map(|(name, value)| ColumnSchema {
                name: name.to_string(),
                kind: value.kind(),
            })
            .collect();

        Self { columns }
    }

    /// Checks `row` against the schema, recording kinds of columns that were null so far.
    pub fn observe(&mut self, row: &Row) -> DataKitResult<()> {
        if row.len() != self.columns.len() {
            bail!(
                ErrorKind::MalformedRow,
                "Row does not match the source schema",
                format!(
                    "expected {} columns ({}), got {} ({})",
                    self.columns.len(),
                    self.names().collect::<Vec<_>>().join(", "),
                    row.len(),
                    row.column_names().collect::<Vec<_>>().join(", ")
                )
            );
        }

        for (column, (name, value)) in self.columns.iter_mut().zip(row.iter()) {
            if column.name != name {
                bail!(
                    ErrorKind::MalformedRow,
                    "Row does not match the source schema",
                    format!("expected column `{}`, found `{name}`", column.name)
                );
            }

            match (column.kind, value.kind()) {
                (_, None) => {}
                (None, observed) => column.kind = observed,
                (Some(expected), Some(observed)) if expected != observed => {
                    bail!(
                        ErrorKind::MalformedRow,
                        "Row does not match the source schema",
                        format!(
                            "column `{name}` changed kind from {expected} to {observed}"
                        )
                    );
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    fn row(values: &[(&str, Cell)]) -> Row {
        values.iter().cloned().collect()
    }

    #[test]
    fn null_columns_adopt_first_non_null_kind() {
        let mut schema = RowSchema::from_row(&row(&[("id", Cell::I64(1)), ("genre", Cell::Null)]));

        schema
            .observe(&row(&[("id", Cell::I64(2)), ("genre", Cell::from("x"))]))
            .unwrap();

        assert_eq!(schema.columns()[1].kind, Some(CellKind::Text));

        let err = schema
            .observe(&row(&[("id", Cell::I64(3)), ("genre", Cell::I64(4))]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedRow);
    }

    #[test]
    fn integer_and_float_values_are_compatible() {
        let mut schema = RowSchema::from_row(&row(&[("score", Cell::I64(1))]));

        assert!(schema.observe(&row(&[("score", Cell::F64(1.5))])).is_ok());
    }

    #[test]
    fn missing_or_renamed_columns_are_drift() {
        let mut schema = RowSchema::from_row(&row(&[("id", Cell::I64(1)), ("a", Cell::Null)]));

        let missing = schema.observe(&row(&[("id", Cell::I64(1))])).unwrap_err();
        let renamed = schema
            .observe(&row(&[("id", Cell::I64(1)), ("b", Cell::Null)]))
            .unwrap_err();

        assert_eq!(missing.kind(), ErrorKind::MalformedRow);
        assert_eq!(renamed.kind(), ErrorKind::MalformedRow);
    }

    #[test]
    fn index_of_finds_columns() {
        let schema = RowSchema::from_row(&row(&[("id", Cell::I64(1)), ("a", Cell::Null)]));

        assert_eq!(schema.index_of("a"), Some(1));
        assert_eq!(schema.index_of("z"), None);
    }
}
