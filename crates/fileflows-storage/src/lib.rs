//! Fileflows Storage Library
//!
//! File operations over the local filesystem and S3-compatible object stores
//! behind one interface. [`FileOps`] classifies each path argument and routes
//! the call to the local filesystem or to a [`RemoteStore`].
//!
//! # Remote store
//!
//! The remote side is reached only through the [`RemoteStore`] capability
//! trait. [`S3Store`] implements it with the AWS SDK; [`MemoryStore`] keeps
//! objects in process and records what it served, which the tests rely on.
//! `FileOps` builds its store lazily, on the first operation that needs it,
//! and reuses it for the lifetime of the instance.

pub mod blocking;
pub mod columnar;
pub mod factory;
pub mod local;
pub mod memory;
pub mod ops;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod tabular;
pub mod traits;

// Re-export commonly used types
pub use blocking::BlockingFileOps;
pub use factory::create_remote_store;
pub use fileflows_core::{
    bucket_and_key, classify, Backend, FileOpsError, FileOpsResult, IntoLocation, Location,
    RemoteLocation, S3Config,
};
pub use memory::{MemoryStore, MemoryStoreStats};
pub use ops::{FileOps, TransferDirective, TransferReport};
#[cfg(feature = "storage-s3")]
pub use s3::S3Store;
pub use tabular::{Dtypes, Header, Table, TableShape, TabularFormat};
pub use traits::{Listing, ObjectEntry, RemoteStore, StorageError, StorageResult};
