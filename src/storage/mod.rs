//! Object store access: buckets, objects and the CSV→Parquet gateway.
//!
//! [`ObjectStore`] is the narrow seam between the gateway and a concrete
//! backend. [`S3ObjectStore`] talks to any S3-compatible service through
//! `aws-sdk-s3`; [`MemoryObjectStore`] keeps everything in process and
//! follows the same semantics, which makes it the backend of choice for tests.
//!
//! [`ObjectStoreGateway`] layers the columnar conversions on top: CSV files
//! are parsed into a [`Table`](crate::table::Table), encoded as Parquet and
//! uploaded; downloads are decoded back into a table.

pub mod gateway;
pub mod memory;
pub mod s3;

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::error::{ConversionError, ErrorKind};

pub use gateway::{object_key_for, DirectoryUploadReport, ObjectStoreGateway, UploadFailure, UploadReport};
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Errors raised by object store operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store rejected a request or could not be reached
    #[error("{operation} failed ({kind}): {message}")]
    Request {
        operation: &'static str,
        kind: ErrorKind,
        message: String,
    },

    /// A local file or directory could not be read
    #[error("IO error on '{}': {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    /// CSV parsing or Parquet encoding/decoding failed
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl StorageError {
    pub(crate) fn request(
        operation: &'static str,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        StorageError::Request {
            operation,
            kind,
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Request { kind, .. } => *kind,
            StorageError::Io { source, .. } => ErrorKind::from_io(source),
            StorageError::Conversion(e) => e.kind(),
        }
    }
}

/// One entry of an object listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

/// Minimal bucket/object operations the gateway needs from a backend.
///
/// Implementations must list keys in lexicographic order, report a missing
/// bucket or key as [`ErrorKind::NotFound`] and an existing bucket on creation
/// as [`ErrorKind::Conflict`].
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Short backend name for log lines (e.g. `s3`, `memory`).
    fn name(&self) -> &'static str;

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    async fn list_buckets(&self) -> Result<Vec<String>, StorageError>;

    /// Store `body` at `key`, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), StorageError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;

    /// All objects whose key starts with `prefix`, across every result page.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectSummary>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_kind() {
        let err = StorageError::request("get_object", ErrorKind::NotFound, "NoSuchKey");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("get_object"));

        let err = StorageError::Io {
            path: PathBuf::from("/data"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.to_string().contains("/data"));

        let err = StorageError::from(ConversionError::Csv("bad row".to_string()));
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }
}
