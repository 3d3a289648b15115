use crate::types::Cell;

/// Infers a cell from a delimited text field.
///
/// Empty fields are null. Otherwise the field is tried as an integer, then a float, then a
/// boolean (`true`/`false`, any case), and kept as text if none of them parse.
pub fn infer_cell(field: &str) -> Cell {
    if field.is_empty() {
        return Cell::Null;
    }

    if let Ok(value) = field.parse::<i64>() {
        return Cell::I64(value);
    }

    if let Ok(value) = field.parse::<f64>()
        && !looks_like_word(field)
    {
        return Cell::F64(value);
    }

    if field.eq_ignore_ascii_case("true") {
        return Cell::Bool(true);
    }

    if field.eq_ignore_ascii_case("false") {
        return Cell::Bool(false);
    }

    Cell::String(field.to_string())
}

/// Type of a delimited column, widened over the fields observed in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldKind {
    /// Only empty fields seen so far.
    #[default]
    Unknown,
    Integer,
    Float,
    Bool,
    Text,
}

impl FieldKind {
    /// Kind of a single field, following the order used by [`infer_cell`].
    pub fn of(field: &str) -> Self {
        match infer_cell(field) {
            Cell::Null => FieldKind::Unknown,
            Cell::I64(_) => FieldKind::Integer,
            Cell::F64(_) => FieldKind::Float,
            Cell::Bool(_) => FieldKind::Bool,
            _ => FieldKind::Text,
        }
    }

    /// Smallest kind holding both `self` and `other`. Integers widen to floats; any other mix is
    /// text.
    pub fn widen(self, other: FieldKind) -> Self {
        match (self, other) {
            (FieldKind::Unknown, kind) | (kind, FieldKind::Unknown) => kind,
            (a, b) if a == b => a,
            (FieldKind::Integer, FieldKind::Float) | (FieldKind::Float, FieldKind::Integer) => {
                FieldKind::Float
            }
            _ => FieldKind::Text,
        }
    }
}

/// Decodes a field of a column of the given kind.
///
/// A field that does not fit the kind is inferred on its own, so it surfaces as schema drift
/// when it changes the column's kind.
pub fn column_cell(field: &str, kind: FieldKind) -> Cell {
    if field.is_empty() {
        return Cell::Null;
    }

    match kind {
        FieldKind::Unknown => infer_cell(field),
        FieldKind::Text => Cell::String(field.to_string()),
        FieldKind::Float => match infer_cell(field) {
            Cell::I64(value) => Cell::F64(value as f64),
            cell => cell,
        },
        FieldKind::Integer | FieldKind::Bool => infer_cell(field),
    }
}

/// `f64::from_str` accepts `inf`, `infinity` and `nan`; those stay text.
fn looks_like_word(field: &str) -> bool {
    field
        .trim_start_matches(['+', '-'])
        .starts_with(|c: char| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_numbers_and_booleans() {
        assert_eq!(infer_cell("42"), Cell::I64(42));
        assert_eq!(infer_cell("-3"), Cell::I64(-3));
        assert_eq!(infer_cell("1.5"), Cell::F64(1.5));
        assert_eq!(infer_cell("1e3"), Cell::F64(1000.0));
        assert_eq!(infer_cell("True"), Cell::Bool(true));
        assert_eq!(infer_cell("false"), Cell::Bool(false));
    }

    #[test]
    fn empty_field_is_null() {
        assert_eq!(infer_cell(""), Cell::Null);
    }

    #[test]
    fn words_stay_text() {
        assert_eq!(infer_cell("nan"), Cell::from("nan"));
        assert_eq!(infer_cell("-inf"), Cell::from("-inf"));
        assert_eq!(infer_cell("SW1A 1AA"), Cell::from("SW1A 1AA"));
    }

    #[test]
    fn column_kind_widens_over_fields() {
        let kind = ["1", "", "2.5"]
            .into_iter()
            .map(FieldKind::of)
            .fold(FieldKind::Unknown, FieldKind::widen);
        assert_eq!(kind, FieldKind::Float);

        let kind = ["1", "A"]
            .into_iter()
            .map(FieldKind::of)
            .fold(FieldKind::Unknown, FieldKind::widen);
        assert_eq!(kind, FieldKind::Text);

        assert_eq!(FieldKind::Bool.widen(FieldKind::Integer), FieldKind::Text);
    }

    #[test]
    fn column_cells_follow_the_column_kind() {
        assert_eq!(column_cell("1", FieldKind::Text), Cell::from("1"));
        assert_eq!(column_cell("1", FieldKind::Float), Cell::F64(1.0));
        assert_eq!(column_cell("7", FieldKind::Integer), Cell::I64(7));
        assert_eq!(column_cell("", FieldKind::Text), Cell::Null);
        assert_eq!(column_cell("x", FieldKind::Float), Cell::from("x"));
    }

    #[test]
    fn text_columns_skip_inference() {
        assert_eq!(column_cell("02134", FieldKind::Text), Cell::from("02134"));
    }
}
