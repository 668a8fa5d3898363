//! # csvlake
//!
//! CSV ingestion into an S3-compatible object store (as Parquet) and into
//! PostgreSQL tables, with column types inferred from the data.
//!
//! The crate exposes two independent facades:
//!
//! - [`ObjectStoreGateway`]: create and list buckets, upload CSV files (one
//!   file or a whole directory) as Parquet objects, list keys under a prefix,
//!   and read Parquet objects back as in-memory [`Table`]s
//! - [`RelationalIngestor`]: create databases and schemas, and bulk load a CSV
//!   file into a table named after the file
//!
//! Both sides share the Arrow-based CSV reader, the type mapping and the
//! [`ErrorKind`] taxonomy. Every operation is `async` and has a `blocking_*`
//! counterpart for synchronous callers.
//!
//! ## Object Store Example
//!
//! ```no_run
//! use csvlake::*;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), StorageError> {
//! let config = ObjectStoreConfig::new()
//!     .with_endpoint("http://localhost:9000")
//!     .with_region("us-east-1")
//!     .with_credentials("minio", "minio123");
//! let gateway = ObjectStoreGateway::connect(&config).await;
//!
//! gateway.create_bucket("landing").await?;
//! gateway
//!     .upload_file("landing", Path::new("orders.csv"), "raw/orders.parquet")
//!     .await?;
//!
//! let keys = gateway.load_object_keys_as_table("landing", "raw/").await?;
//! println!("{} objects", keys.num_rows());
//! # Ok(())
//! # }
//! ```
//!
//! ## PostgreSQL Example
//!
//! ```no_run
//! use csvlake::*;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), IngestError> {
//! let ingestor = RelationalIngestor::new(DatabaseParams::new("localhost", "postgres", "pw"))
//!     .with_options(IngestOptions::new().with_insert_batch_size(500));
//!
//! let report = ingestor
//!     .load_csv_as_table("analytics", "raw", Path::new("orders.csv"))
//!     .await?;
//! assert_eq!(report.rows_inserted as i64, report.verified_row_count);
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod codec;
pub mod config;
pub mod error;
pub mod ingest;
mod runtime;
pub mod storage;
pub mod table;
pub mod types;

// =============================================================================
// Error Types
// =============================================================================

/// Re-export the shared error taxonomy.
pub use error::{ConversionError, ErrorKind};

// =============================================================================
// Configuration
// =============================================================================

pub use config::{DatabaseParams, ObjectStoreConfig};

// =============================================================================
// Tables and Columnar Codecs
// =============================================================================

pub use codec::{
    decode_parquet, encode_parquet, read_csv_bytes, read_csv_file, ParquetCompression,
    ParquetOptions,
};
pub use table::{Table, OBJECT_KEY_COLUMN};
pub use types::{CsvReadOptions, InferredColumn, InferredTableSchema, SqlType, TypeMapper};

// =============================================================================
// Object Store
// =============================================================================

pub use storage::{
    object_key_for, DirectoryUploadReport, MemoryObjectStore, ObjectStore,
    ObjectStoreGateway, ObjectSummary, S3ObjectStore, StorageError, UploadFailure, UploadReport,
};

// =============================================================================
// PostgreSQL Ingestion
// =============================================================================

pub use ingest::{
    ExistingDatabase, IngestError, IngestOptions, IngestReport, PgSession, RelationalIngestor,
};
