//! Error types module
//!
//! Every file operation reports failures through [`FileOpsError`]. Backend
//! failures are only translated far enough to tell "not found" apart from
//! everything else; the original message is kept in both cases.

use std::fmt::Display;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum FileOpsError {
    /// Malformed path, or an operation applied to the wrong kind of location.
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// File, object, bucket or directory missing where existence was required.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other failure surfaced by the filesystem or the object-store client.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The remote store could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The transfer completed but removing the source afterwards failed.
    /// The destination is left in place.
    #[error("Transferred to {destination} but failed to delete source: {source}")]
    SourceCleanup {
        destination: String,
        #[source]
        source: Box<FileOpsError>,
    },
}

/// Result type for file operations
pub type FileOpsResult<T> = Result<T, FileOpsError>;

impl FileOpsError {
    /// Map an I/O error, keeping `NotFound` distinct from every other kind.
    pub fn from_io(err: io::Error, context: impl Display) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FileOpsError::NotFound(context.to_string()),
            _ => FileOpsError::Backend(format!("{}: {}", context, err)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FileOpsError::NotFound(_))
    }
}
