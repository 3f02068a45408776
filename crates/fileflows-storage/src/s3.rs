use crate::traits::{Listing, ObjectEntry, RemoteStore, StorageError, StorageResult};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use fileflows_core::constants::DEFAULT_REGION;
use fileflows_core::S3Config;
use std::fmt::Debug;
use std::ops::Range;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// S3 remote store implementation
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    region: String,
}

impl S3Store {
    /// Build a client from `config`.
    ///
    /// Static credentials are used when both key id and secret are set,
    /// otherwise the default AWS provider chain applies. A custom endpoint
    /// targets S3-compatible providers
    /// (e.g., "http://localhost:9000" for MinIO).
    pub async fn connect(config: &S3Config) -> StorageResult<Self> {
        config
            .validate()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(config.region.clone()));

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id,
                secret,
                config.session_token.clone(),
                None,
                "fileflows-static",
            ));
        }
        let sdk_config = loader.load().await;

        let mut s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style);
        if let Some(ref endpoint) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }
        let client = Client::from_conf(s3_config_builder.build());

        tracing::info!(
            region = %config.region,
            endpoint = ?config.endpoint_url,
            path_style = config.force_path_style,
            "S3 client initialized"
        );

        Ok(Self::from_client(client, config.region.clone()))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, region: impl Into<String>) -> Self {
        S3Store {
            client,
            region: region.into(),
        }
    }
}

/// Value of the `x-amz-copy-source` header.
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, urlencoding::encode(key))
}

/// HTTP `Range` header for an end-exclusive range; `None` when empty.
fn range_header(range: &Range<u64>) -> Option<String> {
    (range.end > range.start).then(|| format!("bytes={}-{}", range.start, range.end - 1))
}

fn service_code<E: ProvideErrorMetadata, R>(err: &SdkError<E, R>) -> Option<&str> {
    err.as_service_error().and_then(|e| e.code())
}

fn get_object_error<R: Debug>(
    err: SdkError<GetObjectError, R>,
    bucket: &str,
    key: &str,
) -> StorageError {
    match &err {
        SdkError::ServiceError(service_err) => match service_err.err() {
            GetObjectError::NoSuchKey(_) => StorageError::NotFound(format!("s3://{}/{}", bucket, key)),
            _ if service_code(&err) == Some("NoSuchBucket") => {
                StorageError::NotFound(format!("bucket {}", bucket))
            }
            _ => StorageError::DownloadFailed(err.to_string()),
        },
        _ => StorageError::DownloadFailed(err.to_string()),
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadBucketError::NotFound(_) => Ok(false),
                    _ => Err(StorageError::BackendError(e.to_string())),
                },
                _ => Err(StorageError::BackendError(e.to_string())),
            },
        }
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();

        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {}
            Err(e) => match e.as_service_error() {
                Some(CreateBucketError::BucketAlreadyOwnedByYou(_)) => {}
                _ => {
                    tracing::error!(
                        error = %e,
                        bucket = %bucket,
                        region = %self.region,
                        "S3 create bucket failed"
                    );
                    return Err(StorageError::BackendError(e.to_string()));
                }
            },
        }

        tracing::info!(
            bucket = %bucket,
            region = %self.region,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 bucket created"
        );

        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadObjectError::NotFound(_) => Ok(false),
                    _ => Err(StorageError::BackendError(e.to_string())),
                },
                _ => Err(StorageError::BackendError(e.to_string())),
            },
        }
    }

    async fn object_size(&self, bucket: &str, key: &str) -> StorageResult<u64> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadObjectError::NotFound(_) => {
                        StorageError::NotFound(format!("s3://{}/{}", bucket, key))
                    }
                    _ => StorageError::BackendError(e.to_string()),
                },
                _ => StorageError::BackendError(e.to_string()),
            })?;

        Ok(head
            .content_length()
            .and_then(|len| u64::try_from(len).ok())
            .unwrap_or(0))
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        if_missing_ok: bool,
    ) -> StorageResult<()> {
        // DeleteObject succeeds for missing keys, so absence has to be checked first
        if !if_missing_ok && !self.object_exists(bucket, key).await? {
            return Err(StorageError::NotFound(format!("s3://{}/{}", bucket, key)));
        }

        let start = std::time::Instant::now();

        let result = self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => {}
            Err(e) if service_code(&e) == Some("NoSuchBucket") => {
                return if if_missing_ok {
                    Ok(())
                } else {
                    Err(StorageError::NotFound(format!("bucket {}", bucket)))
                };
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimited: bool,
    ) -> StorageResult<Listing> {
        let mut listing = Listing::default();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_delimiter(delimited.then(|| "/".to_string()))
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| match &e {
                    SdkError::ServiceError(service_err) => match service_err.err() {
                        ListObjectsV2Error::NoSuchBucket(_) => {
                            StorageError::NotFound(format!("bucket {}", bucket))
                        }
                        _ => StorageError::BackendError(e.to_string()),
                    },
                    _ => StorageError::BackendError(e.to_string()),
                })?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    listing.objects.push(ObjectEntry {
                        key: key.to_string(),
                        size: object
                            .size()
                            .and_then(|size| u64::try_from(size).ok())
                            .unwrap_or(0),
                    });
                }
            }
            for common_prefix in response.common_prefixes() {
                if let Some(p) = common_prefix.prefix() {
                    listing.prefixes.push(p.to_string());
                }
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        tracing::debug!(
            bucket = %bucket,
            prefix = %prefix,
            objects = listing.objects.len(),
            prefixes = listing.prefixes.len(),
            "S3 listing complete"
        );

        Ok(listing)
    }

    async fn upload_file(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<u64> {
        let size = fs::metadata(local_path).await?.len();
        let start = std::time::Instant::now();

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            path = %local_path.display(),
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(size)
    }

    async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> StorageResult<u64> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| get_object_error(e, bucket, key))?;

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(local_path).await.map_err(|e| {
            StorageError::DownloadFailed(format!(
                "Failed to create file {}: {}",
                local_path.display(),
                e
            ))
        })?;

        let mut body = response.body;
        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            path = %local_path.display(),
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(written)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StorageResult<()> {
        let start = std::time::Instant::now();

        self.client
            .copy_object()
            .bucket(dst_bucket)
            .copy_source(copy_source(src_bucket, src_key))
            .key(dst_key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    src_bucket = %src_bucket,
                    src_key = %src_key,
                    dst_bucket = %dst_bucket,
                    dst_key = %dst_key,
                    "S3 copy failed"
                );
                StorageError::BackendError(e.to_string())
            })?;

        tracing::info!(
            src_bucket = %src_bucket,
            src_key = %src_key,
            dst_bucket = %dst_bucket,
            dst_key = %dst_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 copy successful"
        );

        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| get_object_error(e, bucket, key))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes();

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 get successful"
        );

        Ok(data)
    }

    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> StorageResult<Bytes> {
        let Some(header) = range_header(&range) else {
            return Ok(Bytes::new());
        };

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(header)
            .send()
            .await
            .map_err(|e| get_object_error(e, bucket, key))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes();

        tracing::debug!(
            bucket = %bucket,
            key = %key,
            start = range.start,
            end = range.end,
            size_bytes = data.len(),
            "S3 range read"
        );

        Ok(data)
    }
}
