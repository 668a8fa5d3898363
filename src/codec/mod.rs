//! Conversion between CSV files, in-memory tables and Parquet payloads.
//!
//! # Overview
//!
//! - `csv` parses a CSV file into a [`Table`](crate::table::Table), inferring
//!   column types with arrow-csv
//! - `parquet` encodes a table into an in-memory Parquet file and decodes it back
//!
//! Both directions load the full data set into memory; there is no streaming.

pub mod csv;
pub mod parquet;

pub use self::csv::{read_csv_bytes, read_csv_file};
pub use self::parquet::{
    decode_parquet, encode_parquet, ParquetCompression, ParquetOptions, PARQUET_EXTENSION,
};
