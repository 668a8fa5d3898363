//! Inferred table schemas and DDL generation.
//!
//! An [`InferredTableSchema`] is derived from the Arrow schema of a parsed CSV
//! file. Every column is mapped to a [`SqlType`] up front, so an unmappable
//! column is detected before any DDL is sent to the server.

use std::path::Path;

use arrow::datatypes::{DataType, Schema};

use super::mapping::{SqlType, TypeMapper};
use crate::error::ConversionError;

/// An inferred column definition for DDL generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredColumn {
    /// Column name as it appears in the CSV header.
    pub name: String,
    /// Arrow type produced by CSV inference.
    pub arrow_type: DataType,
    /// Destination column type.
    pub sql_type: SqlType,
}

/// Destination columns for one table, in source order.
#[derive(Debug, Clone)]
pub struct InferredTableSchema {
    pub columns: Vec<InferredColumn>,
}

impl InferredTableSchema {
    /// Map every field of an Arrow schema to a destination type.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::UnsupportedType` for the first field whose
    /// type has no mapping.
    pub fn from_arrow_schema(schema: &Schema) -> Result<Self, ConversionError> {
        let columns = schema
            .fields()
            .iter()
            .map(|field| {
                let sql_type = TypeMapper::arrow_to_sql(field.name(), field.data_type())?;
                Ok(InferredColumn {
                    name: field.name().clone(),
                    arrow_type: field.data_type().clone(),
                    sql_type,
                })
            })
            .collect::<Result<Vec<_>, ConversionError>>()?;

        Ok(Self { columns })
    }

    /// Column names in source order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Generate a `CREATE TABLE IF NOT EXISTS` statement for this schema.
    ///
    /// Schema, table and column names are always quoted.
    ///
    /// ```ignore
    /// let ddl = schema.to_ddl("my_schema", "my_table");
    /// // CREATE TABLE IF NOT EXISTS "my_schema"."my_table" (
    /// //     "id" INTEGER,
    /// //     "name" TEXT
    /// // )
    /// ```
    #[must_use]
    pub fn to_ddl(&self, schema_name: &str, table_name: &str) -> String {
        let column_defs: Vec<String> = self
            .columns
            .iter()
            .map(|col| {
                format!(
                    "    {} {}",
                    quote_identifier(&col.name),
                    col.sql_type.to_ddl_type()
                )
            })
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            qualified_name(schema_name, table_name),
            column_defs.join(",\n")
        )
    }
}

/// Quote an identifier for PostgreSQL.
///
/// Wraps the name in double quotes and doubles any internal double quote.
///
/// ```ignore
/// assert_eq!(quote_identifier("my Column"), "\"my Column\"");
/// assert_eq!(quote_identifier("col\"name"), "\"col\"\"name\"");
/// ```
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

/// `"schema"."table"`
#[must_use]
pub fn qualified_name(schema_name: &str, table_name: &str) -> String {
    format!(
        "{}.{}",
        quote_identifier(schema_name),
        quote_identifier(table_name)
    )
}

/// Derive a table name from a file path: the base name with its extension stripped.
///
/// Returns `None` when the path has no file name.
#[must_use]
pub fn table_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}
