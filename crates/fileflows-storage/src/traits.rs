//! Remote store abstraction trait
//!
//! This module defines the capabilities the file operations need from an
//! object store. Bucket and key are always passed explicitly; a store is not
//! bound to a single bucket.

use async_trait::async_trait;
use bytes::Bytes;
use fileflows_core::FileOpsError;
use std::ops::Range;
use std::path::Path;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for FileOpsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => FileOpsError::NotFound(what),
            StorageError::ConfigError(msg) => FileOpsError::Config(msg),
            StorageError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                FileOpsError::NotFound(e.to_string())
            }
            other => FileOpsError::Backend(other.to_string()),
        }
    }
}

/// A single object returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

/// Result of listing a prefix.
///
/// `prefixes` is only filled by delimited listings and holds the "sub-directory"
/// prefixes one level below, each ending in `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub objects: Vec<ObjectEntry>,
    pub prefixes: Vec<String>,
}

/// Remote store abstraction trait
///
/// Implementations must be safe to share across threads: `FileOps` hands the
/// same instance to every caller.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool>;

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Create the bucket unless it already exists.
    async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        if self.bucket_exists(bucket).await? {
            return Ok(());
        }
        self.create_bucket(bucket).await
    }

    /// Missing buckets report `false`, not an error.
    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Size in bytes; `NotFound` if the object does not exist.
    async fn object_size(&self, bucket: &str, key: &str) -> StorageResult<u64>;

    /// Delete an object. A missing object is `NotFound` unless `if_missing_ok`.
    async fn delete_object(&self, bucket: &str, key: &str, if_missing_ok: bool)
        -> StorageResult<()>;

    /// List objects under `prefix`. With `delimited`, only direct children are
    /// returned and deeper keys are folded into `Listing::prefixes`.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimited: bool,
    ) -> StorageResult<Listing>;

    /// Upload a local file. Returns the number of bytes uploaded.
    async fn upload_file(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<u64>;

    /// Download an object to a local file, overwriting it and creating parent
    /// directories. Returns the number of bytes written.
    async fn download_file(&self, bucket: &str, key: &str, local_path: &Path)
        -> StorageResult<u64>;

    /// Server-side copy.
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StorageResult<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Read `range` (end exclusive) of an object.
    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> StorageResult<Bytes>;
}
