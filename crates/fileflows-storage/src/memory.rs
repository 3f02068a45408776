//! In-process object store
//!
//! Keeps buckets and objects in memory and counts the reads it serves, so
//! callers can check how much of an object an operation actually fetched.

use crate::traits::{Listing, ObjectEntry, RemoteStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::fs;

type Buckets = BTreeMap<String, BTreeMap<String, Bytes>>;

/// Read counters of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// Whole-object reads (`get_object`, `download_file`, server-side copies).
    pub full_reads: u64,
    pub range_reads: u64,
    pub bytes_served: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    buckets: RwLock<Buckets>,
    full_reads: AtomicU64,
    range_reads: AtomicU64,
    bytes_served: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `bucket` if needed and store `data` under `key`.
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) -> StorageResult<()> {
        self.write()?
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
        Ok(())
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            full_reads: self.full_reads.load(Ordering::Relaxed),
            range_reads: self.range_reads.load(Ordering::Relaxed),
            bytes_served: self.bytes_served.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.full_reads.store(0, Ordering::Relaxed);
        self.range_reads.store(0, Ordering::Relaxed);
        self.bytes_served.store(0, Ordering::Relaxed);
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Buckets>> {
        self.buckets
            .read()
            .map_err(|e| StorageError::BackendError(format!("memory store lock poisoned: {}", e)))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Buckets>> {
        self.buckets
            .write()
            .map_err(|e| StorageError::BackendError(format!("memory store lock poisoned: {}", e)))
    }

    fn object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let buckets = self.read()?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::NotFound(format!("bucket {}", bucket)))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("s3://{}/{}", bucket, key)))
    }

    fn record_full_read(&self, len: usize) {
        self.full_reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(len as u64, Ordering::Relaxed);
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        Ok(self.read()?.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.write()?.entry(bucket.to_string()).or_default();
        tracing::info!(bucket = %bucket, "Memory store bucket created");
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self
            .read()?
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key)))
    }

    async fn object_size(&self, bucket: &str, key: &str) -> StorageResult<u64> {
        Ok(self.object(bucket, key)?.len() as u64)
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        if_missing_ok: bool,
    ) -> StorageResult<()> {
        let removed = self
            .write()?
            .get_mut(bucket)
            .and_then(|objects| objects.remove(key));

        match removed {
            Some(_) => Ok(()),
            None if if_missing_ok => Ok(()),
            None => Err(StorageError::NotFound(format!("s3://{}/{}", bucket, key))),
        }
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimited: bool,
    ) -> StorageResult<Listing> {
        let buckets = self.read()?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::NotFound(format!("bucket {}", bucket)))?;

        let mut listing = Listing::default();
        let mut prefixes = BTreeSet::new();
        for (key, data) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            if delimited {
                if let Some(idx) = rest.find('/') {
                    prefixes.insert(format!("{}{}", prefix, &rest[..=idx]));
                    continue;
                }
            }
            listing.objects.push(ObjectEntry {
                key: key.clone(),
                size: data.len() as u64,
            });
        }
        listing.prefixes = prefixes.into_iter().collect();

        Ok(listing)
    }

    async fn upload_file(&self, local_path: &Path, bucket: &str, key: &str) -> StorageResult<u64> {
        let data = fs::read(local_path).await?;
        let size = data.len() as u64;

        let mut buckets = self.write()?;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::NotFound(format!("bucket {}", bucket)))?;
        objects.insert(key.to_string(), Bytes::from(data));

        Ok(size)
    }

    async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
    ) -> StorageResult<u64> {
        let data = self.object(bucket, key)?;
        self.record_full_read(data.len());

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(local_path, &data).await?;

        Ok(data.len() as u64)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StorageResult<()> {
        let data = self.object(src_bucket, src_key)?;
        self.record_full_read(data.len());

        let mut buckets = self.write()?;
        let objects = buckets
            .get_mut(dst_bucket)
            .ok_or_else(|| StorageError::NotFound(format!("bucket {}", dst_bucket)))?;
        objects.insert(dst_key.to_string(), data);

        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let data = self.object(bucket, key)?;
        self.record_full_read(data.len());
        Ok(data)
    }

    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> StorageResult<Bytes> {
        let data = self.object(bucket, key)?;
        let len = data.len() as u64;
        if range.start > range.end || range.end > len {
            return Err(StorageError::BackendError(format!(
                "range {}..{} out of bounds for s3://{}/{} ({} bytes)",
                range.start, range.end, bucket, key, len
            )));
        }

        let slice = data.slice(range.start as usize..range.end as usize);
        self.range_reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_served
            .fetch_add(slice.len() as u64, Ordering::Relaxed);
        Ok(slice)
    }
}
