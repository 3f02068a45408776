//! Blocking facade over [`FileOps`]
//!
//! Each call runs to completion on a private current-thread runtime before
//! returning. Do not call these methods from inside an async context; use
//! [`FileOps`] there instead.

use crate::ops::{FileOps, TransferDirective, TransferReport};
use crate::tabular::{Dtypes, Header, Table, TableShape};
use crate::traits::RemoteStore;
use fileflows_core::{FileOpsError, FileOpsResult, IntoLocation, Location, S3Config};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

pub struct BlockingFileOps {
    inner: FileOps,
    runtime: Runtime,
}

impl BlockingFileOps {
    pub fn new(s3_config: Option<S3Config>) -> FileOpsResult<Self> {
        Self::from_ops(FileOps::new(s3_config))
    }

    pub fn with_store(store: Arc<dyn RemoteStore>) -> FileOpsResult<Self> {
        Self::from_ops(FileOps::with_store(store))
    }

    pub fn from_ops(inner: FileOps) -> FileOpsResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| FileOpsError::Backend(format!("Failed to start runtime: {}", e)))?;
        Ok(BlockingFileOps { inner, runtime })
    }

    /// The async dispatcher this facade drives.
    pub fn inner(&self) -> &FileOps {
        &self.inner
    }

    pub fn create(&self, location: impl IntoLocation) -> FileOpsResult<()> {
        self.runtime.block_on(self.inner.create(location))
    }

    pub fn transfer(
        &self,
        src: impl IntoLocation,
        dst: impl IntoLocation,
        delete_source: bool,
    ) -> FileOpsResult<TransferReport> {
        self.runtime
            .block_on(self.inner.transfer(src, dst, delete_source))
    }

    pub fn execute(&self, directive: TransferDirective) -> FileOpsResult<TransferReport> {
        self.runtime.block_on(self.inner.execute(directive))
    }

    pub fn copy(&self, src: impl IntoLocation, dst: impl IntoLocation) -> FileOpsResult<TransferReport> {
        self.runtime.block_on(self.inner.copy(src, dst))
    }

    pub fn move_to(
        &self,
        src: impl IntoLocation,
        dst: impl IntoLocation,
    ) -> FileOpsResult<TransferReport> {
        self.runtime.block_on(self.inner.move_to(src, dst))
    }

    pub fn delete(&self, location: impl IntoLocation, if_missing_ok: bool) -> FileOpsResult<()> {
        self.runtime
            .block_on(self.inner.delete(location, if_missing_ok))
    }

    pub fn exists(&self, location: impl IntoLocation) -> FileOpsResult<bool> {
        self.runtime.block_on(self.inner.exists(location))
    }

    pub fn size(&self, location: impl IntoLocation) -> FileOpsResult<u64> {
        self.runtime.block_on(self.inner.size(location))
    }

    pub fn list(
        &self,
        directory: impl IntoLocation,
        pattern: Option<&str>,
    ) -> FileOpsResult<Vec<Location>> {
        self.runtime.block_on(self.inner.list(directory, pattern))
    }

    pub fn schema(&self, file: impl IntoLocation) -> FileOpsResult<Vec<String>> {
        self.runtime.block_on(self.inner.schema(file))
    }

    pub fn tabular_read(
        &self,
        path: impl IntoLocation,
        header: impl Into<Header>,
        dtypes: Option<&Dtypes>,
        shape: TableShape,
    ) -> FileOpsResult<Table> {
        self.runtime
            .block_on(self.inner.tabular_read(path, header, dtypes, shape))
    }
}
