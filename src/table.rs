//! In-memory tables.
//!
//! A [`Table`] is an Arrow schema plus the RecordBatches that hold its rows.
//! It is what CSV files are parsed into and what Parquet objects decode to.

use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::ConversionError;

/// Column name used by [`Table::from_object_keys`].
pub const OBJECT_KEY_COLUMN: &str = "Object Key";

/// An ordered collection of named, typed columns.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    /// Create a table from a schema and batches sharing that schema.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::Arrow` if a batch's schema differs from `schema`.
    pub fn try_new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self, ConversionError> {
        if let Some(batch) = batches.iter().find(|b| b.schema().fields() != schema.fields()) {
            return Err(ConversionError::Arrow(format!(
                "Batch schema {:?} does not match table schema {:?}",
                batch.schema().fields(),
                schema.fields()
            )));
        }

        Ok(Self { schema, batches })
    }

    /// A table with no columns and no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schema: Arc::new(Schema::empty()),
            batches: Vec::new(),
        }
    }

    /// Build a single-column table (`Object Key`) listing object keys in order.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::Arrow` if the batch cannot be assembled.
    pub fn from_object_keys(keys: Vec<String>) -> Result<Self, ConversionError> {
        let schema = Arc::new(Schema::new(vec![Field::new(
            OBJECT_KEY_COLUMN,
            DataType::Utf8,
            false,
        )]));

        if keys.is_empty() {
            return Ok(Self {
                schema,
                batches: Vec::new(),
            });
        }

        let column: ArrayRef = Arc::new(StringArray::from(keys));
        let batch = RecordBatch::try_new(schema.clone(), vec![column])?;

        Ok(Self {
            schema,
            batches: vec![batch],
        })
    }

    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    #[must_use]
    pub fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// True when the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Concatenate all batches into one RecordBatch.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::Arrow` if concatenation fails.
    pub fn to_record_batch(&self) -> Result<RecordBatch, ConversionError> {
        Ok(concat_batches(&self.schema, &self.batches)?)
    }
}

impl PartialEq for Table {
    /// Tables are equal when column names, types and all values match in row order,
    /// regardless of how rows are split into batches.
    fn eq(&self, other: &Self) -> bool {
        let same_fields = self.schema.fields().len() == other.schema.fields().len()
            && self
                .schema
                .fields()
                .iter()
                .zip(other.schema.fields().iter())
                .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type());

        if !same_fields || self.num_rows() != other.num_rows() {
            return false;
        }

        match (self.to_record_batch(), other.to_record_batch()) {
            (Ok(a), Ok(b)) => a.columns() == b.columns(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array};

    fn int_batch(schema: &SchemaRef, values: Vec<i64>) -> RecordBatch {
        RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(values))]).unwrap()
    }

    fn int_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]))
    }

    #[test]
    fn test_empty_table() {
        let table = Table::empty();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.num_columns(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_from_object_keys() {
        let table =
            Table::from_object_keys(vec!["a/1.parquet".into(), "a/2.parquet".into()]).unwrap();

        assert_eq!(table.column_names(), vec![OBJECT_KEY_COLUMN.to_string()]);
        assert_eq!(table.num_rows(), 2);

        let batch = table.to_record_batch().unwrap();
        let keys = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(keys.value(0), "a/1.parquet");
        assert_eq!(keys.value(1), "a/2.parquet");
    }

    #[test]
    fn test_from_object_keys_empty_keeps_column() {
        let table = Table::from_object_keys(Vec::new()).unwrap();
        assert_eq!(table.num_columns(), 1);
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.to_record_batch().unwrap().num_rows(), 0);
    }

    #[test]
    fn test_try_new_rejects_mismatched_batch() {
        let schema = int_schema();
        let other = Arc::new(Schema::new(vec![Field::new("name", DataType::Utf8, true)]));
        let batch =
            RecordBatch::try_new(other, vec![Arc::new(StringArray::from(vec!["x"]))]).unwrap();

        assert!(Table::try_new(schema, vec![batch]).is_err());
    }

    #[test]
    fn test_equality_ignores_batch_boundaries() {
        let schema = int_schema();
        let split = Table::try_new(
            schema.clone(),
            vec![int_batch(&schema, vec![1, 2]), int_batch(&schema, vec![3])],
        )
        .unwrap();
        let whole = Table::try_new(schema.clone(), vec![int_batch(&schema, vec![1, 2, 3])]).unwrap();
        let reordered =
            Table::try_new(schema.clone(), vec![int_batch(&schema, vec![3, 2, 1])]).unwrap();

        assert_eq!(split, whole);
        assert_ne!(whole, reordered);
        assert_eq!(whole.to_record_batch().unwrap().column(0).len(), 3);
    }
}
