use std::io::Cursor;

use bigdecimal::BigDecimal;
use bigdecimal::num_bigint::{BigInt, BigUint, Sign};
use byteorder::{BigEndian, ReadBytesExt};
use tokio_postgres::types::{FromSql, Type};

use crate::bail;
use crate::error::{DataKitResult, ErrorKind};
use crate::types::Cell;

/// A Postgres `numeric` value, decoded from the binary wire format.
///
/// Aggregates such as `avg()` over integer columns return `numeric`. Cells hold numbers as
/// floats, so [`PgNumeric::into_cell`] rounds to the nearest `f64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgNumeric {
    NaN,
    PositiveInf,
    NegativeInf,
    Value(BigDecimal),
}

impl PgNumeric {
    pub fn into_cell(self) -> DataKitResult<Cell> {
        let value = match self {
            PgNumeric::NaN => f64::NAN,
            PgNumeric::PositiveInf => f64::INFINITY,
            PgNumeric::NegativeInf => f64::NEG_INFINITY,
            PgNumeric::Value(decimal) => match decimal.to_string().parse::<f64>() {
                Ok(value) => value,
                Err(_) => bail!(
                    ErrorKind::ConversionError,
                    "Numeric value does not fit a float",
                    decimal
                ),
            },
        };

        Ok(Cell::F64(value))
    }
}

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + 'static + Sync + Send>> {
        let mut rdr = Cursor::new(raw);

        let n_digits = rdr.read_u16::<BigEndian>()?;
        let weight = rdr.read_i16::<BigEndian>()?;
        let sign = match rdr.read_u16::<BigEndian>()? {
            0x4000 => Sign::Minus,
            0x0000 => Sign::Plus,
            0xC000 => return Ok(PgNumeric::NaN),
            0xD000 => return Ok(PgNumeric::PositiveInf),
            0xF000 => return Ok(PgNumeric::NegativeInf),
            v => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid numeric sign {v:#06x}"),
                )
                .into());
            }
        };
        let scale = rdr.read_u16::<BigEndian>()?;

        // Base 10 000 digits, most significant first.
        let mut magnitude = BigUint::from(0u32);
        for _ in 0..n_digits {
            magnitude = magnitude * 10_000u32 + u32::from(rdr.read_u16::<BigEndian>()?);
        }

        // The first digit carries 10_000^weight.
        let exponent = 4 * (i64::from(weight) - i64::from(n_digits) + 1);
        let value = BigDecimal::new(BigInt::from_biguint(sign, magnitude), -exponent)
            .with_scale(i64::from(scale));

        Ok(PgNumeric::Value(value))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::NUMERIC)
    }
}
