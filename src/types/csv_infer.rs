//! Schema inference for CSV files.
//!
//! Type detection is delegated to arrow-csv, which assigns each column the
//! narrowest of boolean, integer, float, date/timestamp or string that fits
//! every sampled value. A few adjustments are applied on top:
//!
//! - a header-only file has no values to sample, so every column becomes text
//! - without a header row, columns are named `col_1`, `col_2`, ...
//! - a column with no non-empty values is read as nullable float, not `Null`
//! - repeated header names get a `.1`, `.2`, ... suffix in order of appearance

use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema};

use crate::error::ConversionError;

/// Options for reading and inferring CSV files.
///
/// Use the builder pattern to customize options from the defaults.
///
/// # Example
///
/// ```ignore
/// let options = CsvReadOptions::new()
///     .with_delimiter(b';')
///     .with_max_sample_records(Some(10_000));
/// ```
#[derive(Debug, Clone)]
pub struct CsvReadOptions {
    /// Field delimiter byte (default: `,`).
    pub delimiter: u8,
    /// Whether the first row is a header (default: `true`).
    pub has_header: bool,
    /// Quote character (default: `Some(b'"')`).
    pub quote: Option<u8>,
    /// Escape character (default: `None`).
    pub escape: Option<u8>,
    /// Maximum number of records to sample for type inference (default: `None`, all rows).
    pub max_sample_records: Option<usize>,
    /// Number of rows per decoded RecordBatch (default: 8192).
    pub batch_size: usize,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            quote: Some(b'"'),
            escape: None,
            max_sample_records: None,
            batch_size: 8192,
        }
    }
}

impl CsvReadOptions {
    /// Create a new `CsvReadOptions` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    #[must_use]
    pub fn with_quote(mut self, quote: Option<u8>) -> Self {
        self.quote = quote;
        self
    }

    #[must_use]
    pub fn with_escape(mut self, escape: Option<u8>) -> Self {
        self.escape = escape;
        self
    }

    /// Limit type inference to the first `max` records.
    ///
    /// Rows past the sample that do not fit the inferred type fail to parse.
    #[must_use]
    pub fn with_max_sample_records(mut self, max: Option<usize>) -> Self {
        self.max_sample_records = max;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build an arrow-csv `Format` from these options.
    pub(crate) fn format(&self) -> Format {
        let mut format = Format::default()
            .with_header(self.has_header)
            .with_delimiter(self.delimiter);

        if let Some(quote) = self.quote {
            format = format.with_quote(quote);
        }
        if let Some(escape) = self.escape {
            format = format.with_escape(escape);
        }

        format
    }
}

/// Infer the Arrow schema of CSV text already decoded to UTF-8.
///
/// # Errors
///
/// Returns `ConversionError::Csv` if the input cannot be parsed, including an
/// input with no header and no data.
pub fn infer_arrow_schema(data: &[u8], options: &CsvReadOptions) -> Result<Schema, ConversionError> {
    let (schema, records_read) = options
        .format()
        .infer_schema(Cursor::new(data), options.max_sample_records)?;

    if schema.fields().is_empty() {
        return Err(ConversionError::Csv("CSV input has no columns".to_string()));
    }

    let names: Vec<String> = if options.has_header {
        dedup_names(schema.fields().iter().map(|f| f.name().as_str()))
    } else {
        (1..=schema.fields().len()).map(|i| format!("col_{i}")).collect()
    };

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .zip(names)
        .map(|(field, name)| {
            let data_type = match field.data_type() {
                _ if records_read == 0 => DataType::Utf8,
                DataType::Null => DataType::Float64,
                other => other.clone(),
            };
            Field::new(name, data_type, true)
        })
        .collect();

    Ok(Schema::new(fields))
}

/// Decode raw file bytes as UTF-8, replacing undecodable sequences with U+FFFD.
#[must_use]
pub fn decode_lossy(bytes: Vec<u8>) -> Vec<u8> {
    match String::from_utf8(bytes) {
        Ok(text) => text.into_bytes(),
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned().into_bytes(),
    }
}

/// Make header names unique: the second `a` becomes `a.1`, the third `a.2`.
///
/// A suffixed name that is itself taken moves on to the next suffix.
fn dedup_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let names: Vec<&str> = names.collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut next_suffix: HashMap<&str, usize> = HashMap::new();

    names
        .iter()
        .map(|&name| {
            let mut unique = name.to_string();
            if taken.contains(&unique) {
                let suffix = next_suffix.entry(name).or_insert(1);
                loop {
                    unique = format!("{name}.{suffix}");
                    *suffix += 1;
                    if !taken.contains(&unique) {
                        break;
                    }
                }
            }
            taken.insert(unique.clone());
            unique
        })
        .collect()
}
