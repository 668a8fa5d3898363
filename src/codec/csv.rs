//! CSV decoding into in-memory tables.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use arrow::csv::ReaderBuilder;
use arrow::record_batch::RecordBatch;

use crate::error::ConversionError;
use crate::table::Table;
use crate::types::{decode_lossy, infer_arrow_schema, CsvReadOptions};

/// Read a CSV file fully into memory as a [`Table`].
///
/// The file is decoded as UTF-8 with undecodable bytes replaced, its schema
/// is inferred, and every row is parsed against that schema.
///
/// # Errors
///
/// Returns `ConversionError` if the file cannot be read or a value does not
/// parse as its column's inferred type.
pub fn read_csv_file(path: &Path, options: &CsvReadOptions) -> Result<Table, ConversionError> {
    let bytes = std::fs::read(path)?;
    read_csv_bytes(bytes, options)
}

/// Parse CSV bytes into a [`Table`].
///
/// # Errors
///
/// Returns `ConversionError` if the input cannot be parsed.
pub fn read_csv_bytes(bytes: Vec<u8>, options: &CsvReadOptions) -> Result<Table, ConversionError> {
    let data = decode_lossy(bytes);
    let schema = Arc::new(infer_arrow_schema(&data, options)?);

    let reader = ReaderBuilder::new(schema.clone())
        .with_format(options.format())
        .with_batch_size(options.batch_size)
        .build(Cursor::new(data))?;

    let batches = reader.collect::<Result<Vec<RecordBatch>, _>>()?;

    Table::try_new(schema, batches)
}
