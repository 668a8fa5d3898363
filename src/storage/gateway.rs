//! Bucket/object facade with CSV→Parquet conversion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{MemoryObjectStore, ObjectStore, S3ObjectStore, StorageError};
use crate::codec::{decode_parquet, encode_parquet, read_csv_file, ParquetOptions, PARQUET_EXTENSION};
use crate::config::ObjectStoreConfig;
use crate::error::ErrorKind;
use crate::runtime::blocking_runtime;
use crate::table::Table;
use crate::types::CsvReadOptions;

const CSV_SUFFIX: &str = ".csv";

/// Outcome of uploading one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub bucket: String,
    pub key: String,
    /// Source CSV file, if the table came from one.
    pub source: Option<PathBuf>,
    pub rows: usize,
    pub columns: usize,
    /// Size of the encoded Parquet object.
    pub bytes: usize,
}

/// A file from a directory upload that could not be uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadFailure {
    pub source: PathBuf,
    pub key: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of [`ObjectStoreGateway::upload_directory`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryUploadReport {
    pub uploaded: Vec<UploadReport>,
    pub failed: Vec<UploadFailure>,
}

impl DirectoryUploadReport {
    #[must_use]
    pub fn uploaded_keys(&self) -> Vec<&str> {
        self.uploaded.iter().map(|r| r.key.as_str()).collect()
    }

    /// True when every matching file was uploaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Object key for a CSV file uploaded under `prefix`.
///
/// The `.csv` suffix becomes `.parquet`. Trailing slashes on the prefix are
/// collapsed and an empty prefix yields a bare file name.
///
/// ```
/// use csvlake::object_key_for;
///
/// assert_eq!(object_key_for("raw/2024/", "sales.csv"), "raw/2024/sales.parquet");
/// assert_eq!(object_key_for("", "sales.csv"), "sales.parquet");
/// ```
#[must_use]
pub fn object_key_for(prefix: &str, file_name: &str) -> String {
    let stem = file_name.strip_suffix(CSV_SUFFIX).unwrap_or(file_name);
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("{stem}.{PARQUET_EXTENSION}")
    } else {
        format!("{prefix}/{stem}.{PARQUET_EXTENSION}")
    }
}

/// Facade over an [`ObjectStore`] that uploads CSV files as Parquet objects
/// and reads Parquet objects back as tables.
///
/// Every operation is independent: there is no shared transaction and a
/// failure in one call leaves earlier calls' effects in place.
///
/// # Example
///
/// ```no_run
/// use csvlake::{ObjectStoreConfig, ObjectStoreGateway};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), csvlake::StorageError> {
/// let config = ObjectStoreConfig::new()
///     .with_endpoint("http://localhost:9000")
///     .with_credentials("minio", "minio123");
/// let gateway = ObjectStoreGateway::connect(&config).await;
///
/// gateway.create_bucket("landing").await?;
/// let report = gateway
///     .upload_directory("landing", Path::new("./exports"), "daily/")
///     .await?;
/// println!("{} uploaded, {} failed", report.uploaded.len(), report.failed.len());
///
/// let table = gateway.read_file("landing", "daily/sales.parquet").await?;
/// println!("{} rows", table.num_rows());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
    csv_options: CsvReadOptions,
    parquet_options: ParquetOptions,
}

impl ObjectStoreGateway {
    /// Wrap an existing backend.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            csv_options: CsvReadOptions::default(),
            parquet_options: ParquetOptions::default(),
        }
    }

    /// Gateway over an S3-compatible service.
    pub async fn connect(config: &ObjectStoreConfig) -> Self {
        Self::new(Arc::new(S3ObjectStore::connect(config).await))
    }

    /// Gateway over a fresh [`MemoryObjectStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryObjectStore::new()))
    }

    #[must_use]
    pub fn with_csv_options(mut self, options: CsvReadOptions) -> Self {
        self.csv_options = options;
        self
    }

    #[must_use]
    pub fn with_parquet_options(mut self, options: ParquetOptions) -> Self {
        self.parquet_options = options;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Create a bucket in the configured region.
    ///
    /// # Errors
    ///
    /// Kind `Conflict` if the bucket already exists.
    pub async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.store
            .create_bucket(bucket)
            .await
            .inspect_err(|e| warn!(bucket, kind = %e.kind(), error = %e, "Bucket creation failed"))?;
        info!(bucket, backend = self.store.name(), "Created bucket");
        Ok(())
    }

    /// Names of all buckets visible to the configured credentials.
    pub async fn list_buckets(&self) -> Result<Vec<String>, StorageError> {
        let buckets = self
            .store
            .list_buckets()
            .await
            .inspect_err(|e| warn!(kind = %e.kind(), error = %e, "Listing buckets failed"))?;
        debug!(count = buckets.len(), "Listed buckets");
        Ok(buckets)
    }

    /// Encode `table` as Parquet and store it at `key`.
    pub async fn upload_table(
        &self,
        bucket: &str,
        key: &str,
        table: &Table,
    ) -> Result<UploadReport, StorageError> {
        let result = async {
            let body = encode_parquet(table, &self.parquet_options)?;
            let bytes = body.len();
            self.store.put_object(bucket, key, body).await?;
            Ok::<_, StorageError>(UploadReport {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: None,
                rows: table.num_rows(),
                columns: table.num_columns(),
                bytes,
            })
        }
        .await;

        let report = result.inspect_err(|e| {
            warn!(bucket, key, kind = %e.kind(), error = %e, "Upload failed")
        })?;
        info!(
            bucket,
            key,
            rows = report.rows,
            bytes = report.bytes,
            "Uploaded table"
        );
        Ok(report)
    }

    /// Read a CSV file, convert it to Parquet in memory and store it at `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conversion` if the file cannot be read or parsed,
    /// and `StorageError::Request` if the store rejects the upload.
    pub async fn upload_file(
        &self,
        bucket: &str,
        csv_path: &Path,
        key: &str,
    ) -> Result<UploadReport, StorageError> {
        let table = read_csv_file(csv_path, &self.csv_options).inspect_err(|e| {
            warn!(path = %csv_path.display(), kind = %e.kind(), error = %e, "Reading CSV failed")
        })?;

        let mut report = self.upload_table(bucket, key, &table).await?;
        report.source = Some(csv_path.to_path_buf());
        Ok(report)
    }

    /// Upload every `*.csv` file directly inside `dir` under `prefix`.
    ///
    /// Files are processed one at a time in name order. A file that fails is
    /// recorded in the report and the loop moves on to the next one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` only if the directory itself cannot be read.
    pub async fn upload_directory(
        &self,
        bucket: &str,
        dir: &Path,
        prefix: &str,
    ) -> Result<DirectoryUploadReport, StorageError> {
        let files = csv_files_in(dir).inspect_err(|e| {
            warn!(dir = %dir.display(), kind = %e.kind(), error = %e, "Reading directory failed")
        })?;
        info!(dir = %dir.display(), bucket, prefix, files = files.len(), "Uploading directory");

        let mut report = DirectoryUploadReport::default();
        for (path, file_name) in files {
            let key = object_key_for(prefix, &file_name);
            match self.upload_file(bucket, &path, &key).await {
                Ok(uploaded) => report.uploaded.push(uploaded),
                Err(e) => report.failed.push(UploadFailure {
                    source: path,
                    key,
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            }
        }

        info!(
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "Directory upload finished"
        );
        Ok(report)
    }

    /// Keys of all objects under `prefix`, in lexicographic order.
    ///
    /// An empty listing is not an error.
    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let objects = self
            .store
            .list_objects(bucket, prefix)
            .await
            .inspect_err(|e| warn!(bucket, prefix, kind = %e.kind(), error = %e, "Listing objects failed"))?;
        debug!(bucket, prefix, count = objects.len(), "Listed objects");
        Ok(objects.into_iter().map(|o| o.key).collect())
    }

    /// Object keys under `prefix` as a one-column table named `Object Key`.
    pub async fn load_object_keys_as_table(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Table, StorageError> {
        let keys = self.list_objects(bucket, prefix).await?;
        Ok(Table::from_object_keys(keys)?)
    }

    /// Download a Parquet object and decode it into a table.
    pub async fn read_file(&self, bucket: &str, key: &str) -> Result<Table, StorageError> {
        let result = async {
            let body = self.store.get_object(bucket, key).await?;
            Ok::<_, StorageError>(decode_parquet(body, &self.parquet_options)?)
        }
        .await;

        let table = result.inspect_err(|e| {
            warn!(bucket, key, kind = %e.kind(), error = %e, "Reading object failed")
        })?;
        debug!(bucket, key, rows = table.num_rows(), "Read object");
        Ok(table)
    }

    // ========================================================================
    // Blocking wrappers
    // ========================================================================

    /// Blocking variant of [`connect`](Self::connect).
    pub fn blocking_connect(config: &ObjectStoreConfig) -> Self {
        blocking_runtime().block_on(Self::connect(config))
    }

    /// Blocking variant of [`create_bucket`](Self::create_bucket).
    pub fn blocking_create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        blocking_runtime().block_on(self.create_bucket(bucket))
    }

    pub fn blocking_list_buckets(&self) -> Result<Vec<String>, StorageError> {
        blocking_runtime().block_on(self.list_buckets())
    }

    pub fn blocking_upload_table(
        &self,
        bucket: &str,
        key: &str,
        table: &Table,
    ) -> Result<UploadReport, StorageError> {
        blocking_runtime().block_on(self.upload_table(bucket, key, table))
    }

    /// Blocking variant of [`upload_file`](Self::upload_file).
    pub fn blocking_upload_file(
        &self,
        bucket: &str,
        csv_path: &Path,
        key: &str,
    ) -> Result<UploadReport, StorageError> {
        blocking_runtime().block_on(self.upload_file(bucket, csv_path, key))
    }

    /// Blocking variant of [`upload_directory`](Self::upload_directory).
    pub fn blocking_upload_directory(
        &self,
        bucket: &str,
        dir: &Path,
        prefix: &str,
    ) -> Result<DirectoryUploadReport, StorageError> {
        blocking_runtime().block_on(self.upload_directory(bucket, dir, prefix))
    }

    pub fn blocking_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, StorageError> {
        blocking_runtime().block_on(self.list_objects(bucket, prefix))
    }

    pub fn blocking_load_object_keys_as_table(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Table, StorageError> {
        blocking_runtime().block_on(self.load_object_keys_as_table(bucket, prefix))
    }

    /// Blocking variant of [`read_file`](Self::read_file).
    pub fn blocking_read_file(&self, bucket: &str, key: &str) -> Result<Table, StorageError> {
        blocking_runtime().block_on(self.read_file(bucket, key))
    }
}

/// Regular files in `dir` whose name ends in `.csv`, sorted by name.
fn csv_files_in(dir: &Path) -> Result<Vec<(PathBuf, String)>, StorageError> {
    let io_err = |source| StorageError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.ends_with(CSV_SUFFIX) && path.is_file() {
            files.push((path, name));
        }
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_object_key_for() {
        assert_eq!(object_key_for("raw", "a.csv"), "raw/a.parquet");
        assert_eq!(object_key_for("raw/", "a.csv"), "raw/a.parquet");
        assert_eq!(object_key_for("raw//", "a.csv"), "raw/a.parquet");
        assert_eq!(object_key_for("", "a.csv"), "a.parquet");
        assert_eq!(object_key_for("/", "a.csv"), "a.parquet");
        assert_eq!(object_key_for("x", "v1.2.csv"), "x/v1.2.parquet");
    }

    #[test]
    fn test_csv_files_in_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.csv"), "x\n1\n").unwrap();
        fs::write(dir.path().join("a.csv"), "x\n1\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("data.csv.bak"), "x\n1\n").unwrap();
        fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let names: Vec<String> = csv_files_in(dir.path())
            .unwrap()
            .into_iter()
            .map(|(_, name)| name)
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_csv_files_in_missing_dir() {
        let err = csv_files_in(Path::new("/nonexistent/csv/dir")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_directory_report_helpers() {
        let mut report = DirectoryUploadReport::default();
        assert!(report.is_complete());

        report.uploaded.push(UploadReport {
            bucket: "b".into(),
            key: "k.parquet".into(),
            source: None,
            rows: 1,
            columns: 1,
            bytes: 10,
        });
        report.failed.push(UploadFailure {
            source: PathBuf::from("bad.csv"),
            key: "bad.parquet".into(),
            kind: ErrorKind::Malformed,
            message: "bad".into(),
        });

        assert_eq!(report.uploaded_keys(), vec!["k.parquet"]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_blocking_round_trip_in_memory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.csv");
        fs::write(&path, "id,name\n1,ann\n2,bo\n").unwrap();

        let gateway = ObjectStoreGateway::in_memory();
        gateway.blocking_create_bucket("bucket").unwrap();
        let report = gateway
            .blocking_upload_file("bucket", &path, "people.parquet")
            .unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.source.as_deref(), Some(path.as_path()));

        let table = gateway.blocking_read_file("bucket", "people.parquet").unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(
            gateway.blocking_list_objects("bucket", "").unwrap(),
            vec!["people.parquet"]
        );
    }
}
