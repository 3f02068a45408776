//! Fileflows Core Library
//!
//! This crate provides the pieces shared by every fileflows component: path
//! classification into local or remote locations, the error taxonomy, and the
//! object-store configuration.

pub mod config;
pub mod constants;
pub mod error;
pub mod location;
pub mod storage_types;

// Re-export commonly used types
pub use config::S3Config;
pub use constants::REMOTE_SCHEME;
pub use error::{FileOpsError, FileOpsResult};
pub use location::{bucket_and_key, classify, IntoLocation, Location, RemoteLocation};
pub use storage_types::Backend;
