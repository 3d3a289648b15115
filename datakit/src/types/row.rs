use crate::types::Cell;

/// An ordered mapping from column name to [`Cell`].
///
/// Column order is insertion order. Setting an existing column replaces its value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.position(name).map(|index| &self.columns[index].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Sets `name` to `value`, returning the previous value if the column existed.
    pub fn set(&mut self, name: impl Into<String>, value: Cell) -> Option<Cell> {
        let name = name.into();
        match self.position(&name) {
            Some(index) => Some(std::mem::replace(&mut self.columns[index].1, value)),
            None => {
                self.columns.push((name, value));
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Cell> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Consumes the row and returns its values in column order.
    pub fn into_values(self) -> Vec<Cell> {
        self.columns.into_iter().map(|(_, value)| value).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(column, _)| column == name)
    }
}

impl<S: Into<String>> FromIterator<(S, Cell)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, Cell)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.set(name, value);
        }

        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Cell);
    type IntoIter = std::vec::IntoIter<(String, Cell)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_in_place() {
        let mut row: Row = [("a", Cell::I64(1)), ("b", Cell::I64(2))]
            .into_iter()
            .collect();

        let previous = row.set("a", Cell::I64(10));

        assert_eq!(previous, Some(Cell::I64(1)));
        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(row.get("a"), Some(&Cell::I64(10)));
    }

    #[test]
    fn set_appends_new_columns() {
        let mut row = Row::new();
        row.set("b", Cell::Null);
        row.set("a", Cell::from("x"));

        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(row.len(), 2);
        assert!(row.contains("a"));
        assert!(!row.contains("c"));
    }

    #[test]
    fn duplicate_names_collapse_on_collect() {
        let row: Row = [("a", Cell::I64(1)), ("a", Cell::I64(2))]
            .into_iter()
            .collect();

        assert_eq!(row.len(), 1);
        assert_eq!(row.into_values(), vec![Cell::I64(2)]);
    }
}
