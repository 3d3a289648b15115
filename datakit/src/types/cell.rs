use std::error::Error;
use std::fmt;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

/// A single scalar value of a row.
///
/// [`Cell::Null`] is the missing marker: it is what a source yields for SQL `null` or an empty
/// field, and what the assembler writes for every cache column on a lookup miss.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

/// Coarse value kind used to detect schema drift between rows of one source.
///
/// Integer and float widths share [`CellKind::Number`] so that a column mixing `1` and `1.5`
/// is not treated as drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Bool,
    Number,
    Text,
    Bytes,
    Temporal,
    Uuid,
    Json,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellKind::Bool => "bool",
            CellKind::Number => "number",
            CellKind::Text => "text",
            CellKind::Bytes => "bytes",
            CellKind::Temporal => "temporal",
            CellKind::Uuid => "uuid",
            CellKind::Json => "json",
        };

        f.write_str(name)
    }
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the kind of the value, or `None` for [`Cell::Null`].
    pub fn kind(&self) -> Option<CellKind> {
        let kind = match self {
            Cell::Null => return None,
            Cell::Bool(_) => CellKind::Bool,
            Cell::I32(_) | Cell::I64(_) | Cell::F32(_) | Cell::F64(_) => CellKind::Number,
            Cell::String(_) => CellKind::Text,
            Cell::Bytes(_) => CellKind::Bytes,
            Cell::Date(_) | Cell::Time(_) | Cell::Timestamp(_) | Cell::TimestampTz(_) => {
                CellKind::Temporal
            }
            Cell::Uuid(_) => CellKind::Uuid,
            Cell::Json(_) => CellKind::Json,
        };

        Some(kind)
    }

    /// Returns the value as `f64` for numeric cells.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Cell::I32(v) => Some(v as f64),
            Cell::I64(v) => Some(v as f64),
            Cell::F32(v) => Some(v as f64),
            Cell::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::String(v) => Some(v),
            _ => None,
        }
    }
}

/// Renders the value as it is written to delimited output. [`Cell::Null`] renders empty.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(v) => write!(f, "{v}"),
            Cell::I32(v) => write!(f, "{v}"),
            Cell::I64(v) => write!(f, "{v}"),
            Cell::F32(v) => write!(f, "{v}"),
            Cell::F64(v) => write!(f, "{v}"),
            Cell::String(v) => f.write_str(v),
            Cell::Bytes(v) => {
                f.write_str("\\x")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Cell::Date(v) => write!(f, "{v}"),
            Cell::Time(v) => write!(f, "{v}"),
            Cell::Timestamp(v) => write!(f, "{v}"),
            Cell::TimestampTz(v) => write!(f, "{}", v.to_rfc3339()),
            Cell::Uuid(v) => write!(f, "{v}"),
            Cell::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I32(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

/// Binds cells as query parameters.
///
/// Integers and floats are converted to the width the statement expects; other values must
/// match the parameter type exactly.
impl ToSql for Cell {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Cell::Null => Ok(IsNull::Yes),
            Cell::Bool(v) => checked(v, ty, out),
            Cell::I32(v) => integer_to_sql(*v as i64, ty, out),
            Cell::I64(v) => integer_to_sql(*v, ty, out),
            Cell::F32(v) => float_to_sql(*v as f64, ty, out),
            Cell::F64(v) => float_to_sql(*v, ty, out),
            Cell::String(v) => checked(v, ty, out),
            Cell::Bytes(v) => checked(v, ty, out),
            Cell::Date(v) => checked(v, ty, out),
            Cell::Time(v) => checked(v, ty, out),
            Cell::Timestamp(v) => checked(v, ty, out),
            Cell::TimestampTz(v) => checked(v, ty, out),
            Cell::Uuid(v) => checked(v, ty, out),
            Cell::Json(v) => checked(v, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn checked<T: ToSql>(
    value: &T,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    if !T::accepts(ty) {
        let rust_type = std::any::type_name::<T>();
        return Err(format!("value of type {rust_type} cannot be bound to {ty}").into());
    }

    value.to_sql(ty, out)
}

fn integer_to_sql(
    value: i64,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql(ty, out),
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        Type::FLOAT8 => (value as f64).to_sql(ty, out),
        _ => checked(&value, ty, out),
    }
}

fn float_to_sql(
    value: f64,
    ty: &Type,
    out: &mut BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    match *ty {
        Type::FLOAT4 => (value as f32).to_sql(ty, out),
        _ => checked(&value, ty, out),
    }
}
