use std::collections::HashMap;
use std::io;

use crate::error::DataKitResult;
use crate::types::{Cell, Row};

/// A column-oriented table of assembled rows.
///
/// Columns keep the order in which they were first seen. A row that lacks a column present in
/// other rows contributes [`Cell::Null`], so every column has [`ColumnTable::num_rows`] values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnTable {
    names: Vec<String>,
    positions: HashMap<String, usize>,
    columns: Vec<Vec<Cell>>,
    num_rows: usize,
}

impl ColumnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row, adding any column it introduces.
    pub fn push_row(&mut self, row: Row) {
        for (name, value) in row {
            let position = match self.positions.get(&name) {
                Some(&position) => position,
                None => {
                    let position = self.names.len();
                    self.positions.insert(name.clone(), position);
                    self.names.push(name);
                    self.columns.push(vec![Cell::Null; self.num_rows]);
                    position
                }
            };

            let column = &mut self.columns[position];
            // A repeated name within one row keeps the last value.
            if column.len() > self.num_rows {
                column.truncate(self.num_rows);
            }
            column.push(value);
        }

        self.num_rows += 1;
        for column in &mut self.columns {
            if column.len() < self.num_rows {
                column.push(Cell::Null);
            }
        }
    }

    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.positions
            .get(name)
            .map(|&position| self.columns[position].as_slice())
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Returns row `index` with every column of the table.
    pub fn row(&self, index: usize) -> Option<Row> {
        if index >= self.num_rows {
            return None;
        }

        Some(
            self.names
                .iter()
                .zip(&self.columns)
                .map(|(name, column)| (name.as_str(), column[index].clone()))
                .collect(),
        )
    }

    /// Iterates the table row by row.
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.num_rows).filter_map(|index| self.row(index))
    }

    /// Writes the table as delimited text with a header line. Nulls are written as empty fields.
    pub fn write_csv<W: io::Write>(&self, writer: W, delimiter: u8) -> DataKitResult<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);

        writer.write_record(&self.names)?;
        for index in 0..self.num_rows {
            writer.write_record(self.columns.iter().map(|column| column[index].to_string()))?;
        }
        writer.flush()?;

        Ok(())
    }
}

impl FromIterator<Row> for ColumnTable {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        let mut table = ColumnTable::new();
        for row in iter {
            table.push_row(row);
        }

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[(&str, Cell)]) -> Row {
        values.iter().cloned().collect()
    }

    #[test]
    fn columns_are_unioned_in_first_seen_order() {
        let table: ColumnTable = vec![
            row(&[("a", Cell::I64(1)), ("b", Cell::I64(2))]),
            row(&[("c", Cell::I64(3)), ("a", Cell::I64(4))]),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.column_names(), &["a", "b", "c"]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column("a").unwrap(), &[Cell::I64(1), Cell::I64(4)]);
        assert_eq!(table.column("b").unwrap(), &[Cell::I64(2), Cell::Null]);
        assert_eq!(table.column("c").unwrap(), &[Cell::Null, Cell::I64(3)]);
    }

    #[test]
    fn rows_are_rebuilt_with_all_columns() {
        let table: ColumnTable = vec![row(&[("a", Cell::I64(1))]), row(&[("b", Cell::I64(2))])]
            .into_iter()
            .collect();

        let rows: Vec<Row> = table.rows().collect();

        assert_eq!(rows[0], row(&[("a", Cell::I64(1)), ("b", Cell::Null)]));
        assert_eq!(rows[1], row(&[("a", Cell::Null), ("b", Cell::I64(2))]));
        assert!(table.row(2).is_none());
    }

    #[test]
    fn writes_delimited_output() {
        let table: ColumnTable = vec![
            row(&[("user_id", Cell::I64(1)), ("genre", Cell::from("x"))]),
            row(&[("user_id", Cell::I64(9)), ("genre", Cell::Null)]),
        ]
        .into_iter()
        .collect();

        let mut out = Vec::new();
        table.write_csv(&mut out, b',').unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "user_id,genre\n1,x\n9,\n");
    }

    #[test]
    fn empty_table_has_no_columns() {
        let table = ColumnTable::new();

        assert!(table.is_empty());
        assert_eq!(table.num_columns(), 0);
        assert_eq!(table.rows().count(), 0);
    }
}
