//! S3-compatible object store backed by `aws-sdk-s3`.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use super::{ObjectStore, ObjectSummary, StorageError};
use crate::config::ObjectStoreConfig;
use crate::error::ErrorKind;

/// Object store reached through the AWS S3 API.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    location_constraint: Option<String>,
}

impl S3ObjectStore {
    /// Build a client from explicit settings.
    ///
    /// Settings left unset fall back to the ambient AWS configuration
    /// (environment variables, profile files, instance metadata).
    pub async fn connect(config: &ObjectStoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some((access_key, secret_key)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "csvlake",
            ));
        }
        if let Some(timeout) = config.timeout {
            loader = loader.timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(timeout)
                    .connect_timeout(timeout)
                    .build(),
            );
        }

        let shared = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            region = config.region.as_deref().unwrap_or("ambient"),
            "Configured S3 client"
        );

        Self::from_client(
            Client::from_conf(builder.build()),
            config.location_constraint().map(str::to_string),
        )
    }

    /// Wrap an already configured client.
    #[must_use]
    pub fn from_client(client: Client, location_constraint: Option<String>) -> Self {
        Self {
            client,
            location_constraint,
        }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if let Some(region) = &self.location_constraint {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| request_error("create_bucket", e))?;
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>, StorageError> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| request_error("list_buckets", e))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| request_error("put_object", e))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| request_error("get_object", e))?;

        let body = output.body.collect().await.map_err(|e| {
            StorageError::request(
                "get_object",
                ErrorKind::ConnectionLost,
                format!("failed to read body of '{key}': {e}"),
            )
        })?;

        Ok(body.into_bytes())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectSummary>, StorageError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| request_error("list_objects", e))?;
            objects.extend(page.contents().iter().filter_map(|object| {
                object.key().map(|key| ObjectSummary {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                })
            }));
        }

        Ok(objects)
    }
}

/// Convert an SDK failure into a classified [`StorageError`].
fn request_error<E>(operation: &'static str, err: SdkError<E>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let kind = match &err {
        SdkError::ServiceError(service) => kind_from_code(service.err().code())
            .unwrap_or_else(|| ErrorKind::from_http_status(service.raw().status().as_u16())),
        SdkError::ConstructionFailure(_) => ErrorKind::Malformed,
        _ => ErrorKind::ConnectionLost,
    };

    StorageError::request(operation, kind, DisplayErrorContext(&err).to_string())
}

/// Classify a well-known S3 error code.
fn kind_from_code(code: Option<&str>) -> Option<ErrorKind> {
    let kind = match code? {
        "NoSuchBucket" | "NoSuchKey" | "NotFound" => ErrorKind::NotFound,
        "AccessDenied" | "AllAccessDisabled" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
        | "ExpiredToken" => ErrorKind::PermissionDenied,
        "BucketAlreadyExists" | "BucketAlreadyOwnedByYou" => ErrorKind::Conflict,
        "InvalidBucketName"
        | "InvalidArgument"
        | "InvalidRequest"
        | "MalformedXML"
        | "InvalidLocationConstraint"
        | "IllegalLocationConstraintException" => ErrorKind::Malformed,
        "InternalError" | "ServiceUnavailable" | "SlowDown" | "RequestTimeout" => {
            ErrorKind::ConnectionLost
        }
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_code() {
        assert_eq!(kind_from_code(Some("NoSuchBucket")), Some(ErrorKind::NotFound));
        assert_eq!(kind_from_code(Some("NoSuchKey")), Some(ErrorKind::NotFound));
        assert_eq!(
            kind_from_code(Some("AccessDenied")),
            Some(ErrorKind::PermissionDenied)
        );
        assert_eq!(
            kind_from_code(Some("BucketAlreadyOwnedByYou")),
            Some(ErrorKind::Conflict)
        );
        assert_eq!(
            kind_from_code(Some("InvalidBucketName")),
            Some(ErrorKind::Malformed)
        );
        assert_eq!(kind_from_code(Some("SlowDown")), Some(ErrorKind::ConnectionLost));
        assert_eq!(kind_from_code(Some("SomethingNew")), None);
        assert_eq!(kind_from_code(None), None);
    }

    #[tokio::test]
    async fn test_connect_keeps_location_constraint() {
        let config = ObjectStoreConfig::new()
            .with_endpoint("http://127.0.0.1:9")
            .with_region("eu-west-1")
            .with_credentials("ak", "sk");
        let store = S3ObjectStore::connect(&config).await;
        assert_eq!(store.location_constraint.as_deref(), Some("eu-west-1"));
        assert_eq!(store.name(), "s3");

        let config = ObjectStoreConfig::new()
            .with_endpoint("http://127.0.0.1:9")
            .with_region("us-east-1")
            .with_credentials("ak", "sk");
        let store = S3ObjectStore::connect(&config).await;
        assert!(store.location_constraint.is_none());
    }
}
