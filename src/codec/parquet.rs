//! Parquet encoding and decoding of in-memory tables.
//!
//! Object-store payloads are complete Parquet files held in memory: uploads
//! encode a [`Table`] into a byte buffer and downloads decode a buffer back
//! into a [`Table`]. The Arrow schema is embedded in the file metadata, so
//! column names and types survive the round trip.

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression as ParquetCompressionCodec;
use parquet::file::properties::WriterProperties;

use crate::error::ConversionError;
use crate::table::Table;

/// File extension used for encoded objects.
pub const PARQUET_EXTENSION: &str = "parquet";

/// Compression options for Parquet encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParquetCompression {
    /// No compression
    None,
    /// Snappy compression (fast, moderate ratio)
    #[default]
    Snappy,
    /// Gzip compression (slower, better ratio)
    Gzip,
    /// LZ4 compression (very fast, lower ratio)
    Lz4,
    /// Zstd compression (good balance of speed and ratio)
    Zstd,
}

impl ParquetCompression {
    /// Convert to parquet compression codec.
    fn to_codec(self) -> ParquetCompressionCodec {
        match self {
            ParquetCompression::None => ParquetCompressionCodec::UNCOMPRESSED,
            ParquetCompression::Snappy => ParquetCompressionCodec::SNAPPY,
            ParquetCompression::Gzip => ParquetCompressionCodec::GZIP(Default::default()),
            ParquetCompression::Lz4 => ParquetCompressionCodec::LZ4_RAW,
            ParquetCompression::Zstd => ParquetCompressionCodec::ZSTD(Default::default()),
        }
    }
}

impl std::str::FromStr for ParquetCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(ParquetCompression::None),
            "snappy" => Ok(ParquetCompression::Snappy),
            "gzip" => Ok(ParquetCompression::Gzip),
            "lz4" => Ok(ParquetCompression::Lz4),
            "zstd" => Ok(ParquetCompression::Zstd),
            other => Err(format!("unknown parquet compression '{other}'")),
        }
    }
}

/// Options for Parquet encoding and decoding.
#[derive(Debug, Clone)]
pub struct ParquetOptions {
    /// Compression codec (default: Snappy)
    pub compression: ParquetCompression,
    /// Maximum rows per row group (default: 1 048 576)
    pub max_row_group_size: usize,
    /// Rows per decoded RecordBatch (default: 8192)
    pub read_batch_size: usize,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self {
            compression: ParquetCompression::default(),
            max_row_group_size: 1024 * 1024,
            read_batch_size: 8192,
        }
    }
}

impl ParquetOptions {
    /// Create a new `ParquetOptions` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression type.
    #[must_use]
    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_max_row_group_size(mut self, rows: usize) -> Self {
        self.max_row_group_size = rows.max(1);
        self
    }

    #[must_use]
    pub fn with_read_batch_size(mut self, rows: usize) -> Self {
        self.read_batch_size = rows.max(1);
        self
    }
}

/// Encode a table as an in-memory Parquet file.
///
/// # Errors
///
/// Returns `ConversionError::Parquet` if the writer rejects the schema or a batch.
pub fn encode_parquet(table: &Table, options: &ParquetOptions) -> Result<Bytes, ConversionError> {
    let props = WriterProperties::builder()
        .set_compression(options.compression.to_codec())
        .set_max_row_group_size(options.max_row_group_size)
        .build();

    // Parquet writer is synchronous, write into a buffer first
    let mut buffer = Vec::new();
    {
        let mut writer = ArrowWriter::try_new(&mut buffer, table.schema(), Some(props))?;

        for batch in table.batches() {
            writer.write(batch)?;
        }

        // Close the writer to flush remaining data and the footer
        writer.close()?;
    }

    Ok(Bytes::from(buffer))
}

/// Decode an in-memory Parquet file into a table.
///
/// # Errors
///
/// Returns `ConversionError::Parquet` if the bytes are not a valid Parquet file.
pub fn decode_parquet(data: Bytes, options: &ParquetOptions) -> Result<Table, ConversionError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)?;
    let schema = builder.schema().clone();
    let reader = builder.with_batch_size(options.read_batch_size).build()?;

    let batches = reader.collect::<Result<Vec<RecordBatch>, _>>()?;

    Table::try_new(schema, batches)
}
