//! Arrow columns to bindable SQL values.
//!
//! Every column is first cast to the canonical Arrow type of its destination
//! [`SqlType`] (Int64, Float64, Utf8, Boolean, Timestamp(µs)), so the row
//! extraction below only has to handle those five array types.

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{Float64Type, Int64Type, TimestampMicrosecondType};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime};
use sqlx::query_builder::Separated;
use sqlx::Postgres;

use crate::error::ConversionError;
use crate::types::SqlType;

/// One cell ready to be bound as a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL, typed so the parameter carries the column's type.
    Null(SqlType),
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    /// Bind this value as the next parameter of a `VALUES` tuple.
    pub(crate) fn push_bind_to<'args>(self, target: &mut Separated<'_, 'args, Postgres, &'static str>) {
        match self {
            SqlValue::Null(SqlType::Integer) => target.push_bind(None::<i64>),
            SqlValue::Null(SqlType::Float) => target.push_bind(None::<f64>),
            SqlValue::Null(SqlType::Text) => target.push_bind(None::<String>),
            SqlValue::Null(SqlType::Boolean) => target.push_bind(None::<bool>),
            SqlValue::Null(SqlType::Timestamp) => target.push_bind(None::<NaiveDateTime>),
            SqlValue::Integer(v) => target.push_bind(v),
            SqlValue::Float(v) => target.push_bind(v),
            SqlValue::Text(v) => target.push_bind(v),
            SqlValue::Boolean(v) => target.push_bind(v),
            SqlValue::Timestamp(v) => target.push_bind(v),
        };
    }
}

/// Convert a batch into rows of SQL values, preserving row and column order.
///
/// `types` holds the destination type of each column, in schema order.
///
/// # Errors
///
/// Returns `ConversionError::Arrow` if a column cannot be cast to its
/// destination type and `ConversionError::InvalidValue` for a timestamp
/// outside the representable range.
pub fn batch_rows(
    batch: &RecordBatch,
    types: &[SqlType],
) -> Result<Vec<Vec<SqlValue>>, ConversionError> {
    if types.len() != batch.num_columns() {
        return Err(ConversionError::Arrow(format!(
            "Expected {} column types, batch has {} columns",
            types.len(),
            batch.num_columns()
        )));
    }

    let columns = batch
        .columns()
        .iter()
        .zip(types)
        .map(|(column, sql_type)| {
            cast(column, &sql_type.arrow_type()).map_err(ConversionError::from)
        })
        .collect::<Result<Vec<ArrayRef>, ConversionError>>()?;

    let schema = batch.schema();
    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut values = Vec::with_capacity(columns.len());
        for (col_idx, (column, sql_type)) in columns.iter().zip(types).enumerate() {
            values.push(value_at(column.as_ref(), row, *sql_type).map_err(|message| {
                ConversionError::InvalidValue {
                    column: schema.field(col_idx).name().clone(),
                    row,
                    message,
                }
            })?);
        }
        rows.push(values);
    }

    Ok(rows)
}

/// Read one cell of a column already cast to `sql_type.arrow_type()`.
fn value_at(array: &dyn Array, row: usize, sql_type: SqlType) -> Result<SqlValue, String> {
    if array.is_null(row) {
        return Ok(SqlValue::Null(sql_type));
    }

    let value = match sql_type {
        SqlType::Integer => SqlValue::Integer(array.as_primitive::<Int64Type>().value(row)),
        SqlType::Float => SqlValue::Float(array.as_primitive::<Float64Type>().value(row)),
        SqlType::Text => SqlValue::Text(array.as_string::<i32>().value(row).to_string()),
        SqlType::Boolean => SqlValue::Boolean(array.as_boolean().value(row)),
        SqlType::Timestamp => {
            let micros = array.as_primitive::<TimestampMicrosecondType>().value(row);
            let datetime = DateTime::from_timestamp_micros(micros)
                .ok_or_else(|| format!("timestamp {micros}µs is out of range"))?;
            SqlValue::Timestamp(datetime.naive_utc())
        }
    };

    Ok(value)
}

/// Rows per multi-row `INSERT`, keeping each statement under the protocol's
/// 65535 bind parameter limit.
pub(crate) fn rows_per_statement(batch_size: usize, num_columns: usize) -> usize {
    const MAX_BIND_PARAMS: usize = u16::MAX as usize;
    let by_params = MAX_BIND_PARAMS / num_columns.max(1);
    batch_size.min(by_params).max(1)
}
