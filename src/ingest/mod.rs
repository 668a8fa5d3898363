//! CSV ingestion into PostgreSQL tables.
//!
//! # Overview
//!
//! [`RelationalIngestor::load_csv_as_table`] runs the whole pipeline for one
//! file:
//! 1. `CREATE DATABASE` (an existing database is a `Conflict`)
//! 2. connect to that database and `CREATE SCHEMA IF NOT EXISTS`
//! 3. read the CSV into memory and infer one type per column
//! 4. map the inferred types, failing before any DDL if one is unmapped
//! 5. `CREATE TABLE IF NOT EXISTS`, named after the file's base name
//! 6. insert every row in one transaction with bound parameters
//! 7. `SELECT COUNT(*)` to verify
//!
//! The individual steps are also exposed as separate operations on a
//! [`PgSession`].

mod ingestor;
mod session;
mod values;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::error::{ConversionError, ErrorKind};
use crate::types::CsvReadOptions;

pub use ingestor::{IngestReport, RelationalIngestor};
pub use session::PgSession;
pub use values::{batch_rows, SqlValue};

/// Default number of rows per multi-row INSERT statement.
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 1000;

/// Default number of inserted rows between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 200_000;

/// Errors raised by ingestion operations.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The server rejected a statement or the connection failed
    #[error("{operation} failed ({kind}): {message}")]
    Database {
        operation: &'static str,
        kind: ErrorKind,
        /// SQLSTATE reported by the server, if any
        sqlstate: Option<String>,
        message: String,
    },

    /// Connecting did not complete within the configured timeout
    #[error("Timed out after {timeout:?} connecting to {host}:{port}/{database}")]
    ConnectTimeout {
        host: String,
        port: u16,
        database: String,
        timeout: Duration,
    },

    /// The CSV could not be read, parsed or mapped to column types
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// No table name can be derived from the CSV path
    #[error("Cannot derive a table name from '{}'", .0.display())]
    InvalidTableName(PathBuf),
}

impl IngestError {
    pub(crate) fn from_sqlx(operation: &'static str, err: sqlx::Error) -> Self {
        let sqlstate = match &err {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        };
        let kind = match &sqlstate {
            Some(code) => kind_from_sqlstate(code),
            None => kind_from_sqlx(&err),
        };

        IngestError::Database {
            operation,
            kind,
            sqlstate,
            message: err.to_string(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Database { kind, .. } => *kind,
            IngestError::ConnectTimeout { .. } => ErrorKind::ConnectionLost,
            IngestError::Conversion(e) => e.kind(),
            IngestError::InvalidTableName(_) => ErrorKind::Malformed,
        }
    }

    /// SQLSTATE code, for server-side failures.
    #[must_use]
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            IngestError::Database { sqlstate, .. } => sqlstate.as_deref(),
            _ => None,
        }
    }
}

/// Classify a PostgreSQL SQLSTATE code.
fn kind_from_sqlstate(code: &str) -> ErrorKind {
    match code {
        // duplicate_database, duplicate_schema, duplicate_table
        "42P04" | "42P06" | "42P07" => ErrorKind::Conflict,
        "42501" => ErrorKind::PermissionDenied,
        // invalid_catalog_name, invalid_schema_name, undefined_table
        "3D000" | "3F000" | "42P01" => ErrorKind::NotFound,
        "57P01" => ErrorKind::ConnectionLost,
        _ => match code.get(..2) {
            Some("23") => ErrorKind::Conflict,
            Some("28") => ErrorKind::PermissionDenied,
            Some("08") | Some("53") | Some("57") | Some("58") | Some("XX") => {
                ErrorKind::ConnectionLost
            }
            _ => ErrorKind::Malformed,
        },
    }
}

/// Classify a driver-side failure that carries no SQLSTATE.
fn kind_from_sqlx(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::RowNotFound => ErrorKind::NotFound,
        sqlx::Error::Configuration(_)
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Encode(_)
        | sqlx::Error::Decode(_) => ErrorKind::Malformed,
        _ => ErrorKind::ConnectionLost,
    }
}

/// What to do when the target database already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingDatabase {
    /// Stop with a `Conflict` error and leave the database untouched.
    #[default]
    Abort,
    /// Log the conflict and load into the existing database.
    Continue,
}

/// Options for [`RelationalIngestor`].
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// CSV parsing and inference settings
    pub csv_options: CsvReadOptions,
    /// Rows per INSERT statement (default: 1000)
    pub insert_batch_size: usize,
    /// Behaviour when `CREATE DATABASE` hits an existing database
    pub existing_database: ExistingDatabase,
    /// Rows between progress log lines, 0 disables (default: 200 000)
    pub progress_interval: u64,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            csv_options: CsvReadOptions::default(),
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
            existing_database: ExistingDatabase::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl IngestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_csv_options(mut self, options: CsvReadOptions) -> Self {
        self.csv_options = options;
        self
    }

    /// Set rows per INSERT statement. `1` issues one statement per row.
    #[must_use]
    pub fn with_insert_batch_size(mut self, rows: usize) -> Self {
        self.insert_batch_size = rows.max(1);
        self
    }

    #[must_use]
    pub fn with_existing_database(mut self, policy: ExistingDatabase) -> Self {
        self.existing_database = policy;
        self
    }

    #[must_use]
    pub fn with_progress_interval(mut self, rows: u64) -> Self {
        self.progress_interval = rows;
        self
    }
}
