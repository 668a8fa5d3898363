//! In-process object store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{ObjectStore, ObjectSummary, StorageError};
use crate::error::ErrorKind;

type Bucket = BTreeMap<String, Bytes>;

/// Object store held entirely in memory.
///
/// Buckets and keys are kept in ordered maps, so listings come back sorted
/// the same way S3 sorts them.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<BTreeMap<String, Bucket>>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn no_such_bucket(operation: &'static str, bucket: &str) -> StorageError {
        StorageError::request(
            operation,
            ErrorKind::NotFound,
            format!("NoSuchBucket: bucket '{bucket}' does not exist"),
        )
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(bucket) {
            return Err(StorageError::request(
                "create_bucket",
                ErrorKind::Conflict,
                format!("BucketAlreadyOwnedByYou: bucket '{bucket}' already exists"),
            ));
        }
        buckets.insert(bucket.to_string(), Bucket::new());
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.buckets.read().await.keys().cloned().collect())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::no_such_bucket("put_object", bucket))?;
        objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Self::no_such_bucket("get_object", bucket))?;
        objects.get(key).cloned().ok_or_else(|| {
            StorageError::request(
                "get_object",
                ErrorKind::NotFound,
                format!("NoSuchKey: '{key}' not found in bucket '{bucket}'"),
            )
        })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectSummary>, StorageError> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Self::no_such_bucket("list_objects", bucket))?;

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, body)| ObjectSummary {
                key: key.clone(),
                size: body.len() as u64,
            })
            .collect())
    }
}
