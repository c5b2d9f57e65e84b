//! S3 storage backend.
//!
//! Works against AWS S3 and S3-compatible stores (MinIO, LocalStack) via an
//! optional endpoint override with path-style addressing. Timeouts and the
//! transient-error retry budget are configured once on the client, not per
//! call.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::storage::{ObjectMeta, StorageBackend};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 2;

/// Connection options for [`S3Backend`].
#[derive(Debug, Clone)]
pub struct S3Options {
    /// Bucket name.
    pub bucket: String,
    /// AWS region.
    pub region: String,
    /// Endpoint override for S3-compatible stores.
    pub endpoint: Option<String>,
    /// Static access key ID. When absent, the default credential chain
    /// (IAM role, environment) is used.
    pub access_key_id: Option<String>,
    /// Static secret access key.
    pub secret_access_key: Option<String>,
    /// Use path-style addressing (required by MinIO).
    pub force_path_style: bool,
}

/// Object storage backend over AWS S3.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Connects to the given bucket and verifies reachability.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket is unreachable or the credentials are
    /// rejected.
    pub async fn connect(options: S3Options) -> Result<Self> {
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(options.region.clone()))
            .timeout_config(timeouts)
            .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS));

        if let (Some(key_id), Some(secret)) = (
            options.access_key_id.as_deref(),
            options.secret_access_key.as_deref(),
        ) {
            loader =
                loader.credentials_provider(Credentials::new(key_id, secret, None, None, "silo"));
        }

        let shared = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(options.force_path_style);
        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let backend = Self {
            client: Client::from_conf(builder.build()),
            bucket: options.bucket,
        };

        tracing::info!(bucket = %backend.bucket, region = %options.region, "testing S3 connection");
        backend.check_reachable().await?;
        tracing::info!(bucket = %backend.bucket, "S3 connection verified");

        Ok(backend)
    }

    /// Returns the bucket this backend is bound to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn get(&self, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match &err {
                SdkError::ServiceError(ctx) if ctx.err().is_no_such_key() => {
                    Error::NotFound(format!("object not found: {key}"))
                }
                _ => Error::storage_with_source(format!("get failed for {key}"), err),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|err| Error::storage_with_source(format!("reading body of {key}"), err))?
            .into_bytes();

        Ok(data)
    }

    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request
            .send()
            .await
            .map_err(|err| Error::storage_with_source(format!("put failed for {key}"), err))?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut metas = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| {
                Error::storage_with_source(format!("list failed for prefix {prefix}"), err)
            })?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                metas.push(ObjectMeta {
                    key: key.to_string(),
                    size: object
                        .size()
                        .and_then(|s| u64::try_from(s).ok())
                        .unwrap_or(0),
                    last_modified: object
                        .last_modified()
                        .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }
        }

        Ok(metas)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let identifiers = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| Error::storage_with_source("building delete request", err))?;

        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .build()
            .map_err(|err| Error::storage_with_source("building delete request", err))?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|err| {
                Error::storage_with_source(format!("delete failed for {} keys", keys.len()), err)
            })?;

        Ok(())
    }

    async fn check_reachable(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| {
                Error::storage_with_source(format!("bucket {} is unreachable", self.bucket), err)
            })?;

        Ok(())
    }
}
