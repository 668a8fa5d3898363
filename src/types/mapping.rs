//! Type mapping between Arrow data types and PostgreSQL column types.

use arrow::datatypes::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// Destination column type for an ingested CSV column.
///
/// The set is closed: a CSV column whose inferred Arrow type does not map to
/// one of these variants cannot be ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    /// INTEGER
    Integer,
    /// FLOAT (double precision)
    Float,
    /// TEXT
    Text,
    /// BOOLEAN
    Boolean,
    /// TIMESTAMP (without time zone)
    Timestamp,
}

impl SqlType {
    /// Convert this type to a DDL type string suitable for CREATE TABLE statements.
    #[must_use]
    pub fn to_ddl_type(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Float => "FLOAT",
            SqlType::Text => "TEXT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Timestamp => "TIMESTAMP",
        }
    }

    /// The Arrow type values of this column are normalised to before binding.
    #[must_use]
    pub fn arrow_type(&self) -> DataType {
        match self {
            SqlType::Integer => DataType::Int64,
            SqlType::Float => DataType::Float64,
            SqlType::Text => DataType::Utf8,
            SqlType::Boolean => DataType::Boolean,
            SqlType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_ddl_type())
    }
}

/// Type mapper for converting inferred Arrow types to PostgreSQL types.
pub struct TypeMapper;

impl TypeMapper {
    /// Convert an Arrow DataType to a destination column type.
    ///
    /// Only the five scalar families produced by CSV inference are accepted:
    /// integers, floats, strings, booleans and timestamps (dates are widened
    /// to timestamps at midnight). A `Null` column holds no values and is
    /// stored as FLOAT. Zoned timestamps are rejected because the destination
    /// type carries no zone.
    ///
    /// # Errors
    /// Returns `ConversionError::UnsupportedType` if the type cannot be mapped.
    pub fn arrow_to_sql(column: &str, arrow_type: &DataType) -> Result<SqlType, ConversionError> {
        match arrow_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32 => Ok(SqlType::Integer),

            DataType::Float16 | DataType::Float32 | DataType::Float64 | DataType::Null => {
                Ok(SqlType::Float)
            }

            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Ok(SqlType::Text),

            DataType::Boolean => Ok(SqlType::Boolean),

            DataType::Timestamp(_, None) | DataType::Date32 | DataType::Date64 => {
                Ok(SqlType::Timestamp)
            }

            _ => Err(ConversionError::UnsupportedType {
                column: column.to_string(),
                data_type: format!("{arrow_type:?}"),
            }),
        }
    }
}
