//! Unified file operations
//!
//! [`FileOps`] accepts local paths and `s3://bucket/key` URIs interchangeably.
//! Each path argument is classified on its own, then the call is routed to
//! the local filesystem helpers or to the remote store. Transfers handle all
//! four combinations of source and destination backends.

use crate::columnar::{read_column_names, LocalFileSource, RemoteObjectSource};
use crate::factory::create_remote_store;
use crate::local;
use crate::tabular::{read_table, Dtypes, Header, Table, TableShape, TabularFormat};
use crate::traits::RemoteStore;
use fileflows_core::{
    FileOpsError, FileOpsResult, IntoLocation, Location, RemoteLocation, S3Config,
};
use glob::{MatchOptions, Pattern};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;

/// One transfer request. Built per call and consumed by [`FileOps::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDirective {
    pub source: Location,
    pub destination: Location,
    pub delete_source: bool,
}

impl TransferDirective {
    pub fn new(
        source: impl IntoLocation,
        destination: impl IntoLocation,
        delete_source: bool,
    ) -> FileOpsResult<Self> {
        Ok(TransferDirective {
            source: source.into_location()?,
            destination: destination.into_location()?,
            delete_source,
        })
    }
}

/// Outcome of a successful transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Every file written, as `(source, destination)` pairs.
    pub files: Vec<(Location, Location)>,
    pub bytes: u64,
}

/// Dispatcher over the local filesystem and a remote object store.
///
/// The remote store is built on the first operation that touches an
/// `s3://` location and shared by all later calls on this instance.
pub struct FileOps {
    s3_config: Option<S3Config>,
    remote: OnceCell<Arc<dyn RemoteStore>>,
}

impl FileOps {
    /// `s3_config` of `None` reads the configuration from the environment
    /// when the remote store is first needed.
    pub fn new(s3_config: Option<S3Config>) -> Self {
        FileOps {
            s3_config,
            remote: OnceCell::new(),
        }
    }

    /// Use an already constructed remote store.
    pub fn with_store(store: Arc<dyn RemoteStore>) -> Self {
        FileOps {
            s3_config: None,
            remote: OnceCell::new_with(Some(store)),
        }
    }

    async fn remote(&self) -> FileOpsResult<&Arc<dyn RemoteStore>> {
        self.remote
            .get_or_try_init(|| async {
                let config = match &self.s3_config {
                    Some(config) => config.clone(),
                    None => S3Config::from_env().map_err(|e| FileOpsError::Config(e.to_string()))?,
                };
                tracing::debug!(
                    region = %config.region,
                    endpoint = ?config.endpoint_url,
                    "Creating remote store"
                );
                Ok::<_, FileOpsError>(create_remote_store(&config).await?)
            })
            .await
    }

    /// Ensure a local directory (with parents) or a bucket exists.
    pub async fn create(&self, location: impl IntoLocation) -> FileOpsResult<()> {
        match location.into_location()? {
            Location::Local(path) => local::ensure_dir(&path).await,
            Location::Remote(remote) => {
                self.remote().await?.ensure_bucket(remote.bucket()).await?;
                tracing::debug!(bucket = %remote.bucket(), "Bucket ensured");
                Ok(())
            }
        }
    }

    pub async fn copy(
        &self,
        src: impl IntoLocation,
        dst: impl IntoLocation,
    ) -> FileOpsResult<TransferReport> {
        self.transfer(src, dst, false).await
    }

    pub async fn move_to(
        &self,
        src: impl IntoLocation,
        dst: impl IntoLocation,
    ) -> FileOpsResult<TransferReport> {
        self.transfer(src, dst, true).await
    }

    /// Copy `src` to `dst`, then delete `src` when `delete_source` is set.
    pub async fn transfer(
        &self,
        src: impl IntoLocation,
        dst: impl IntoLocation,
        delete_source: bool,
    ) -> FileOpsResult<TransferReport> {
        self.execute(TransferDirective::new(src, dst, delete_source)?)
            .await
    }

    /// Run a transfer.
    ///
    /// A directory-like source (local directory, or a key that is empty or
    /// ends in `/`) copies every file below it to the same relative path
    /// under the destination. A single file copied onto a directory-like
    /// destination keeps its file name.
    ///
    /// An empty local directory is a valid source and transfers nothing,
    /// while a prefix with no objects below it does not exist and is
    /// `NotFound`. A destination that is the source itself, or for a
    /// directory source lies anywhere below it, is `InvalidLocation`.
    ///
    /// If the copy succeeds but deleting the source fails, the destination
    /// is kept and [`FileOpsError::SourceCleanup`] is returned.
    pub async fn execute(&self, directive: TransferDirective) -> FileOpsResult<TransferReport> {
        let start = Instant::now();
        let pairs = self.plan(&directive).await?;

        let mut report = TransferReport::default();
        for (src, dst) in pairs {
            report.bytes += self.transfer_one(&src, &dst).await?;
            report.files.push((src, dst));
        }

        if directive.delete_source {
            if let Err(e) = self.delete(&directive.source, false).await {
                tracing::error!(
                    error = %e,
                    source = %directive.source,
                    destination = %directive.destination,
                    "Failed to delete transfer source"
                );
                return Err(FileOpsError::SourceCleanup {
                    destination: directive.destination.to_string(),
                    source: Box::new(e),
                });
            }
        }

        tracing::info!(
            source = %directive.source,
            destination = %directive.destination,
            files = report.files.len(),
            size_bytes = report.bytes,
            delete_source = directive.delete_source,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Transfer successful"
        );

        Ok(report)
    }

    /// Expand a directive into single-file `(source, destination)` pairs.
    async fn plan(&self, directive: &TransferDirective) -> FileOpsResult<Vec<(Location, Location)>> {
        let source = &directive.source;
        let destination = &directive.destination;

        let source_is_dir = match source {
            Location::Local(path) => local::is_dir(path).await?,
            Location::Remote(remote) => remote.is_prefix(),
        };
        if source_is_dir {
            check_overlap(source, destination, true).await?;
        }

        let relative_files = match source {
            _ if !source_is_dir => None,
            Location::Local(path) => {
                let mut files = Vec::new();
                for file in local::walk_files(path).await? {
                    files.push(local::relative_key(path, &file)?);
                }
                Some(files)
            }
            Location::Remote(remote) => {
                let prefix = remote.prefix();
                let listing = self
                    .remote()
                    .await?
                    .list_objects(remote.bucket(), &prefix, false)
                    .await?;
                let files = listing
                    .objects
                    .into_iter()
                    .filter_map(|object| {
                        object
                            .key
                            .strip_prefix(&prefix)
                            .filter(|rel| !rel.is_empty() && !rel.ends_with('/'))
                            .map(str::to_string)
                    })
                    .collect::<Vec<_>>();
                if files.is_empty() {
                    return Err(FileOpsError::NotFound(source.to_string()));
                }
                Some(files)
            }
        };

        let Some(relative_files) = relative_files else {
            if !self.exists(source).await? {
                return Err(FileOpsError::NotFound(source.to_string()));
            }
            let target = if self.is_directory_like(destination).await? {
                let name = source.file_name().ok_or_else(|| {
                    FileOpsError::InvalidLocation(format!("{} has no file name", source))
                })?;
                destination.join(&name)
            } else {
                destination.clone()
            };
            check_overlap(source, &target, false).await?;
            return Ok(vec![(source.clone(), target)]);
        };

        tracing::debug!(
            source = %source,
            destination = %destination,
            files = relative_files.len(),
            "Directory transfer planned"
        );

        Ok(relative_files
            .iter()
            .map(|rel| (source.join(rel), destination.join(rel)))
            .collect())
    }

    async fn is_directory_like(&self, location: &Location) -> FileOpsResult<bool> {
        match location {
            Location::Remote(remote) => Ok(remote.is_prefix()),
            Location::Local(path) => Ok(has_trailing_separator(path) || local::is_dir(path).await?),
        }
    }

    /// Copy a single file. Returns the number of bytes transferred.
    async fn transfer_one(&self, src: &Location, dst: &Location) -> FileOpsResult<u64> {
        tracing::debug!(
            source = %src,
            destination = %dst,
            route = %format!("{}->{}", src.backend(), dst.backend()),
            "Transferring file"
        );

        match (src, dst) {
            (Location::Remote(s), Location::Remote(d)) => {
                let store = self.remote().await?;
                let size = store.object_size(s.bucket(), s.key()).await?;
                store
                    .copy_object(s.bucket(), s.key(), d.bucket(), d.key())
                    .await?;
                Ok(size)
            }
            (Location::Remote(s), Location::Local(d)) => Ok(self
                .remote()
                .await?
                .download_file(s.bucket(), s.key(), d)
                .await?),
            (Location::Local(s), Location::Remote(d)) => Ok(self
                .remote()
                .await?
                .upload_file(s, d.bucket(), d.key())
                .await?),
            (Location::Local(s), Location::Local(d)) => local::copy_file(s, d).await,
        }
    }

    /// Delete a file, a local directory tree, or every object under a prefix.
    pub async fn delete(&self, location: impl IntoLocation, if_missing_ok: bool) -> FileOpsResult<()> {
        let location = location.into_location()?;
        let result = match &location {
            Location::Local(path) => local::remove(path, if_missing_ok).await,
            Location::Remote(remote) if remote.is_prefix() => {
                self.delete_prefix(remote, if_missing_ok).await
            }
            Location::Remote(remote) => self
                .remote()
                .await?
                .delete_object(remote.bucket(), remote.key(), if_missing_ok)
                .await
                .map_err(FileOpsError::from),
        };

        match result {
            Err(e) if if_missing_ok && e.is_not_found() => Ok(()),
            other => other,
        }
    }

    async fn delete_prefix(&self, remote: &RemoteLocation, if_missing_ok: bool) -> FileOpsResult<()> {
        let store = self.remote().await?;
        let listing = store
            .list_objects(remote.bucket(), &remote.prefix(), false)
            .await?;
        if listing.objects.is_empty() && !if_missing_ok {
            return Err(FileOpsError::NotFound(remote.to_string()));
        }

        for object in &listing.objects {
            store.delete_object(remote.bucket(), &object.key, true).await?;
        }

        tracing::info!(
            bucket = %remote.bucket(),
            prefix = %remote.prefix(),
            objects = listing.objects.len(),
            "Prefix delete successful"
        );
        Ok(())
    }

    /// Whether the location exists. A missing bucket is `false`, not an error.
    pub async fn exists(&self, location: impl IntoLocation) -> FileOpsResult<bool> {
        let remote = match location.into_location()? {
            Location::Local(path) => return local::exists(&path).await,
            Location::Remote(remote) => remote,
        };

        let store = self.remote().await?;
        let result = if remote.key().is_empty() {
            store.bucket_exists(remote.bucket()).await
        } else if remote.is_prefix() {
            store
                .list_objects(remote.bucket(), remote.key(), true)
                .await
                .map(|listing| !listing.objects.is_empty() || !listing.prefixes.is_empty())
        } else {
            store.object_exists(remote.bucket(), remote.key()).await
        };

        match result.map_err(FileOpsError::from) {
            Err(e) if e.is_not_found() => Ok(false),
            other => other,
        }
    }

    /// Size in bytes. Directories and prefixes report the total of their files.
    pub async fn size(&self, location: impl IntoLocation) -> FileOpsResult<u64> {
        let remote = match location.into_location()? {
            Location::Local(path) => return local::size(&path).await,
            Location::Remote(remote) => remote,
        };

        let store = self.remote().await?;
        if !remote.is_prefix() {
            return Ok(store.object_size(remote.bucket(), remote.key()).await?);
        }

        let listing = store
            .list_objects(remote.bucket(), remote.key(), false)
            .await?;
        if listing.objects.is_empty() {
            return Err(FileOpsError::NotFound(remote.to_string()));
        }
        Ok(listing.objects.iter().map(|object| object.size).sum())
    }

    /// Entries of `directory`, optionally filtered by a glob `pattern`
    /// relative to it.
    ///
    /// Without a pattern only direct children are returned; remote
    /// sub-prefixes are included with a trailing `/`. In a pattern `*` never
    /// crosses `/`, while `**` does. Order is unspecified.
    pub async fn list(
        &self,
        directory: impl IntoLocation,
        pattern: Option<&str>,
    ) -> FileOpsResult<Vec<Location>> {
        let remote = match directory.into_location()? {
            Location::Local(path) => {
                let paths = match pattern {
                    Some(pattern) => local::glob_in(&path, pattern).await?,
                    None => local::list_children(&path).await?,
                };
                return Ok(paths.into_iter().map(Location::Local).collect());
            }
            Location::Remote(remote) => remote,
        };

        let store = self.remote().await?;
        let prefix = remote.prefix();

        let Some(pattern) = pattern else {
            let listing = store.list_objects(remote.bucket(), &prefix, true).await?;
            return listing
                .objects
                .into_iter()
                .map(|object| object.key)
                .chain(listing.prefixes)
                .map(|key| RemoteLocation::new(remote.bucket(), key).map(Location::Remote))
                .collect();
        };

        let matcher = Pattern::new(pattern.trim_start_matches('/')).map_err(|e| {
            FileOpsError::InvalidLocation(format!("Invalid pattern {}: {}", pattern, e))
        })?;
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };

        let listing = store.list_objects(remote.bucket(), &prefix, false).await?;
        listing
            .objects
            .into_iter()
            .filter(|object| {
                object
                    .key
                    .strip_prefix(&prefix)
                    .is_some_and(|rel| matcher.matches_with(rel, options))
            })
            .map(|object| RemoteLocation::new(remote.bucket(), object.key).map(Location::Remote))
            .collect()
    }

    /// Column names of a Parquet file, read from its footer.
    pub async fn schema(&self, file: impl IntoLocation) -> FileOpsResult<Vec<String>> {
        match file.into_location()? {
            Location::Local(path) => read_column_names(&LocalFileSource::new(path)).await,
            Location::Remote(remote) => {
                let store = self.remote().await?;
                read_column_names(&RemoteObjectSource::new(store.as_ref(), &remote)).await
            }
        }
    }

    /// Read a CSV/TSV or Parquet file into memory.
    ///
    /// The format follows the file extension. `dtypes` overrides inferred
    /// column types.
    pub async fn tabular_read(
        &self,
        path: impl IntoLocation,
        header: impl Into<Header>,
        dtypes: Option<&Dtypes>,
        shape: TableShape,
    ) -> FileOpsResult<Table> {
        let location = path.into_location()?;
        let header = header.into();

        let data = match &location {
            Location::Local(path) => tokio::fs::read(path)
                .await
                .map(bytes::Bytes::from)
                .map_err(|e| FileOpsError::from_io(e, path.display()))?,
            Location::Remote(remote) => self
                .remote()
                .await?
                .get_object(remote.bucket(), remote.key())
                .await?,
        };

        read_table(
            data,
            TabularFormat::detect(&location),
            &header,
            dtypes,
            shape,
            &location.to_string(),
        )
    }
}

impl Default for FileOps {
    fn default() -> Self {
        FileOps::new(None)
    }
}

/// Rejects a destination that overlaps the source: the same file, or for a
/// directory source, the directory itself or anything below it. Local paths
/// are compared after resolving symlinks and `..`.
async fn check_overlap(
    source: &Location,
    destination: &Location,
    source_is_dir: bool,
) -> FileOpsResult<()> {
    let overlaps = match (source, destination) {
        (Location::Local(src), Location::Local(dst)) => {
            let src = local::resolve(src).await?;
            let dst = local::resolve(dst).await?;
            if source_is_dir {
                dst.starts_with(&src)
            } else {
                dst == src
            }
        }
        (Location::Remote(src), Location::Remote(dst)) if src.bucket() == dst.bucket() => {
            if source_is_dir {
                dst.prefix().starts_with(&src.prefix())
            } else {
                dst.key() == src.key()
            }
        }
        _ => false,
    };

    if overlaps {
        return Err(FileOpsError::InvalidLocation(format!(
            "destination {} overlaps source {}",
            destination, source
        )));
    }
    Ok(())
}

fn has_trailing_separator(path: &Path) -> bool {
    path.as_os_str()
        .to_string_lossy()
        .ends_with(std::path::MAIN_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use tempfile::tempdir;

    fn ops_with_memory() -> (FileOps, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (FileOps::with_store(store.clone()), store)
    }

    #[tokio::test]
    async fn test_remote_store_is_not_built_for_local_calls() {
        let dir = tempdir().unwrap();
        let ops = FileOps::new(None);

        ops.create(dir.path().join("a")).await.unwrap();
        assert!(ops.exists(dir.path().join("a")).await.unwrap());
        assert!(ops.remote.get().is_none());
    }

    #[tokio::test]
    async fn test_invalid_location_fails_before_backend() {
        let (ops, store) = ops_with_memory();
        let result = ops.exists("s3:///key").await;
        assert!(matches!(result, Err(FileOpsError::InvalidLocation(_))));
        assert_eq!(store.stats().full_reads, 0);
    }

    #[tokio::test]
    async fn test_exists_on_missing_bucket_is_false() {
        let (ops, _store) = ops_with_memory();
        assert!(!ops.exists("s3://nope").await.unwrap());
        assert!(!ops.exists("s3://nope/key").await.unwrap());
        assert!(!ops.exists("s3://nope/dir/").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_into_remote_prefix_keeps_name() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.csv");
        tokio::fs::write(&src, b"x,y\n").await.unwrap();

        let (ops, store) = ops_with_memory();
        ops.create("s3://bucket").await.unwrap();
        let report = ops.copy(&src, "s3://bucket/in/").await.unwrap();

        assert_eq!(report.bytes, 4);
        assert_eq!(
            report.files[0].1,
            Location::parse("s3://bucket/in/a.csv").unwrap()
        );
        assert!(store.object_exists("bucket", "in/a.csv").await.unwrap());
    }

    #[tokio::test]
    async fn test_transfer_onto_itself_is_rejected() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.txt");
        tokio::fs::write(&src, b"data").await.unwrap();

        let ops = FileOps::new(None);
        let result = ops.move_to(&src, dir.path()).await;
        assert!(matches!(result, Err(FileOpsError::InvalidLocation(_))));
        assert!(ops.exists(&src).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_source_writes_nothing() {
        let dir = tempdir().unwrap();
        let (ops, store) = ops_with_memory();
        store.create_bucket("bucket").await.unwrap();

        let result = ops
            .copy("s3://bucket/missing.csv", dir.path().join("out.csv"))
            .await;
        assert!(matches!(result, Err(FileOpsError::NotFound(_))));
        assert!(!ops.exists(dir.path().join("out.csv")).await.unwrap());
    }

    #[tokio::test]
    async fn test_remote_list_with_pattern_does_not_cross_separator() {
        let (ops, store) = ops_with_memory();
        store.put_object("bucket", "data/a.parquet", "a").unwrap();
        store.put_object("bucket", "data/b.csv", "b").unwrap();
        store.put_object("bucket", "data/sub/c.parquet", "c").unwrap();

        let found = ops.list("s3://bucket/data", Some("*.parquet")).await.unwrap();
        assert_eq!(found, vec![Location::parse("s3://bucket/data/a.parquet").unwrap()]);

        let nested = ops
            .list("s3://bucket/data/", Some("sub/*.parquet"))
            .await
            .unwrap();
        assert_eq!(
            nested,
            vec![Location::parse("s3://bucket/data/sub/c.parquet").unwrap()]
        );
    }

    #[tokio::test]
    async fn test_remote_list_without_pattern_returns_children() {
        let (ops, store) = ops_with_memory();
        store.put_object("bucket", "data/a.parquet", "a").unwrap();
        store.put_object("bucket", "data/sub/c.parquet", "c").unwrap();

        let mut found: Vec<String> = ops
            .list("s3://bucket/data/", None)
            .await
            .unwrap()
            .iter()
            .map(Location::to_string)
            .collect();
        found.sort();
        assert_eq!(
            found,
            vec!["s3://bucket/data/a.parquet", "s3://bucket/data/sub/"]
        );
    }

    #[tokio::test]
    async fn test_remote_prefix_size_and_delete() {
        let (ops, store) = ops_with_memory();
        store.put_object("bucket", "dir/a", "12345").unwrap();
        store.put_object("bucket", "dir/sub/b", "123").unwrap();
        store.put_object("bucket", "other", "1").unwrap();

        assert_eq!(ops.size("s3://bucket/dir/").await.unwrap(), 8);

        ops.delete("s3://bucket/dir/", false).await.unwrap();
        assert!(!ops.exists("s3://bucket/dir/").await.unwrap());
        assert!(ops.exists("s3://bucket/other").await.unwrap());

        assert!(matches!(
            ops.delete("s3://bucket/dir/", false).await,
            Err(FileOpsError::NotFound(_))
        ));
        ops.delete("s3://bucket/dir/", true).await.unwrap();
    }
}
