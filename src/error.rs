//! Error taxonomy shared by the object-store gateway and the relational ingestor.
//!
//! Every public operation in this crate returns a module-specific error
//! (`StorageError`, `IngestError`, `ConversionError`). Each of them can be
//! collapsed into an [`ErrorKind`], a small closed set of failure classes that
//! callers can branch on without inspecting messages.

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The bucket, object, file, database, schema or table does not exist.
    NotFound,
    /// Credentials were rejected or the principal lacks a privilege.
    PermissionDenied,
    /// The target already exists (bucket, database, schema, table, key).
    Conflict,
    /// Input could not be parsed, converted or was rejected as invalid.
    Malformed,
    /// The remote endpoint could not be reached or the connection dropped.
    ConnectionLost,
}

impl ErrorKind {
    /// Classify an HTTP status code returned by a remote service.
    #[must_use]
    pub fn from_http_status(status: u16) -> Self {
        match status {
            404 => ErrorKind::NotFound,
            401 | 403 => ErrorKind::PermissionDenied,
            409 | 412 => ErrorKind::Conflict,
            400..=499 => ErrorKind::Malformed,
            _ => ErrorKind::ConnectionLost,
        }
    }

    /// Classify a local IO error.
    #[must_use]
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            io::ErrorKind::AlreadyExists => ErrorKind::Conflict,
            io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => ErrorKind::Malformed,
            _ => ErrorKind::ConnectionLost,
        }
    }

    /// Short lowercase label used in log lines and messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Malformed => "malformed",
            ErrorKind::ConnectionLost => "connection lost",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while reading CSV, encoding or decoding Parquet, or mapping types.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// IO error while reading a source file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV could not be parsed or its schema could not be inferred
    #[error("CSV error: {0}")]
    Csv(String),

    /// Arrow conversion error
    #[error("Arrow error: {0}")]
    Arrow(String),

    /// Parquet encoding or decoding error
    #[error("Parquet error: {0}")]
    Parquet(String),

    /// A column's inferred type has no destination mapping
    #[error("Unsupported type for column '{column}': {data_type}")]
    UnsupportedType { column: String, data_type: String },

    /// A value could not be converted to the expected type
    #[error("Invalid value in column '{column}' at row {row}: {message}")]
    InvalidValue {
        column: String,
        row: usize,
        message: String,
    },
}

impl ConversionError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::Io(e) => ErrorKind::from_io(e),
            _ => ErrorKind::Malformed,
        }
    }
}

impl From<arrow::error::ArrowError> for ConversionError {
    fn from(err: arrow::error::ArrowError) -> Self {
        match err {
            arrow::error::ArrowError::CsvError(msg) => ConversionError::Csv(msg),
            arrow::error::ArrowError::IoError(_, e) => ConversionError::Io(e),
            other => ConversionError::Arrow(other.to_string()),
        }
    }
}

impl From<parquet::errors::ParquetError> for ConversionError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        ConversionError::Parquet(err.to_string())
    }
}
