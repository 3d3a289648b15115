use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::types::{FromSql, Type};
use uuid::Uuid;

use crate::bail;
use crate::conversions::numeric::PgNumeric;
use crate::error::{DataKitError, DataKitResult, ErrorKind};
use crate::types::{Cell, Row};

/// Converts a row returned by tokio-postgres into a [`Row`], keeping column order.
pub fn pg_row_to_row(pg_row: &tokio_postgres::Row) -> DataKitResult<Row> {
    let mut row = Row::with_capacity(pg_row.len());
    for (index, column) in pg_row.columns().iter().enumerate() {
        let cell = pg_value_to_cell(pg_row, index, column.type_())
            .map_err(|err| err.context(format!("column `{}`", column.name())))?;
        row.set(column.name(), cell);
    }

    Ok(row)
}

fn pg_value_to_cell(row: &tokio_postgres::Row, index: usize, ty: &Type) -> DataKitResult<Cell> {
    let cell = match *ty {
        Type::BOOL => get::<bool>(row, index)?.map(Cell::Bool),
        Type::INT2 => get::<i16>(row, index)?.map(|v| Cell::I32(v as i32)),
        Type::INT4 => get::<i32>(row, index)?.map(Cell::I32),
        Type::INT8 => get::<i64>(row, index)?.map(Cell::I64),
        Type::OID => get::<u32>(row, index)?.map(|v| Cell::I64(v as i64)),
        Type::FLOAT4 => get::<f32>(row, index)?.map(Cell::F32),
        Type::FLOAT8 => get::<f64>(row, index)?.map(Cell::F64),
        Type::NUMERIC => get::<PgNumeric>(row, index)?
            .map(PgNumeric::into_cell)
            .transpose()?,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, index)?.map(Cell::String)
        }
        Type::BYTEA => get::<Vec<u8>>(row, index)?.map(Cell::Bytes),
        Type::DATE => get::<NaiveDate>(row, index)?.map(Cell::Date),
        Type::TIME => get::<NaiveTime>(row, index)?.map(Cell::Time),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, index)?.map(Cell::Timestamp),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, index)?.map(Cell::TimestampTz),
        Type::UUID => get::<Uuid>(row, index)?.map(Cell::Uuid),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, index)?.map(Cell::Json),
        _ => bail!(
            ErrorKind::ConversionError,
            "Unsupported Postgres column type",
            format!(
                "type `{ty}` has no cell representation, cast it in the query (e.g. `::float8` or `::text`)"
            )
        ),
    };

    Ok(cell.unwrap_or(Cell::Null))
}

fn get<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    index: usize,
) -> DataKitResult<Option<T>> {
    row.try_get::<_, Option<T>>(index).map_err(DataKitError::from)
}
