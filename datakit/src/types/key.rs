//! Join key representation for keyed caches.

use std::hash::{Hash, Hasher};

use crate::types::{Cell, Row};

/// Largest magnitude below which every integral `f64` maps to a distinct `i64`.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// A lookup key made of one or more cell values.
///
/// Numeric parts compare by value: `I32(1)`, `I64(1)` and `F64(1.0)` are the same key. Every
/// other part is compared with its type, so `String("1")` and `I64(1)` differ.
#[derive(Debug, Clone)]
pub struct JoinKey {
    parts: Vec<Cell>,
}

impl JoinKey {
    pub fn new(parts: Vec<Cell>) -> Self {
        Self {
            parts: parts.into_iter().map(canonicalize).collect(),
        }
    }

    pub fn single(part: Cell) -> Self {
        Self::new(vec![part])
    }

    /// Builds a key from the named columns of `row`, or `None` if one of them is missing.
    pub fn from_row<S: AsRef<str>>(row: &Row, columns: &[S]) -> Option<Self> {
        let parts = columns
            .iter()
            .map(|column| row.get(column.as_ref()).cloned())
            .collect::<Option<Vec<_>>>()?;

        Some(Self::new(parts))
    }

    /// Builds a key from positional values, used when indexing source rows.
    pub fn from_values(values: &[Cell], indices: &[usize]) -> Self {
        Self::new(indices.iter().map(|&index| values[index].clone()).collect())
    }

    pub fn parts(&self) -> &[Cell] {
        &self.parts
    }

    pub fn arity(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` if any part is [`Cell::Null`]. Such keys are never indexed.
    pub fn has_null(&self) -> bool {
        self.parts.iter().any(Cell::is_null)
    }

    /// Applies `f` to every text part in place.
    pub fn map_text(mut self, f: impl Fn(&str) -> String) -> Self {
        for part in &mut self.parts {
            if let Cell::String(value) = part {
                *value = f(value);
            }
        }

        self
    }
}

impl PartialEq for JoinKey {
    fn eq(&self, other: &Self) -> bool {
        self.parts.len() == other.parts.len()
            && self
                .parts
                .iter()
                .zip(&other.parts)
                .all(|(a, b)| part_eq(a, b))
    }
}

// Equality is reflexive because floats are compared by bit pattern after canonicalization.
impl Eq for JoinKey {}

impl Hash for JoinKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.len().hash(state);
        for part in &self.parts {
            part_hash(part, state);
        }
    }
}

/// Widens integers to `I64` and floats to `F64`, folding integral floats into `I64`.
///
/// `F32` widens through its shortest decimal form, so `F32(0.1)` and `F64(0.1)` are one key.
fn canonicalize(cell: Cell) -> Cell {
    match cell {
        Cell::I32(v) => Cell::I64(v as i64),
        Cell::F32(v) => canonicalize_float(widen_f32(v)),
        Cell::F64(v) => canonicalize_float(v),
        other => other,
    }
}

fn widen_f32(value: f32) -> f64 {
    if !value.is_finite() {
        return value as f64;
    }

    value.to_string().parse().unwrap_or(value as f64)
}

fn canonicalize_float(value: f64) -> Cell {
    if value.is_nan() {
        return Cell::F64(f64::NAN);
    }

    if value.fract() == 0.0 && value.abs() < MAX_EXACT_FLOAT_INT {
        return Cell::I64(value as i64);
    }

    Cell::F64(value)
}

fn part_eq(a: &Cell, b: &Cell) -> bool {
    match (a, b) {
        (Cell::F64(a), Cell::F64(b)) => a.to_bits() == b.to_bits(),
        (a, b) => a == b,
    }
}

fn part_hash<H: Hasher>(cell: &Cell, state: &mut H) {
    std::mem::discriminant(cell).hash(state);

    match cell {
        Cell::Null => {}
        Cell::Bool(v) => v.hash(state),
        Cell::I32(v) => v.hash(state),
        Cell::I64(v) => v.hash(state),
        Cell::F32(v) => v.to_bits().hash(state),
        Cell::F64(v) => v.to_bits().hash(state),
        Cell::String(v) => v.hash(state),
        Cell::Bytes(v) => v.hash(state),
        Cell::Date(v) => v.hash(state),
        Cell::Time(v) => v.hash(state),
        Cell::Timestamp(v) => v.hash(state),
        Cell::TimestampTz(v) => v.hash(state),
        Cell::Uuid(v) => v.hash(state),
        Cell::Json(v) => v.to_string().hash(state),
    }
}
