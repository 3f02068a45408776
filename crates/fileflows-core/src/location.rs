//! Path classification
//!
//! Every path handed to a file operation is classified exactly once into a
//! [`Location`]. Strings starting with [`REMOTE_SCHEME`] are object-store
//! locations and are split into bucket and key at the first `/`; everything
//! else is a local filesystem path.
//!
//! `Display` renders the canonical string form, and classifying that string
//! again yields an equal `Location`.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::{KEY_SEPARATOR, REMOTE_SCHEME};
use crate::error::{FileOpsError, FileOpsResult};
use crate::storage_types::Backend;

/// Object-store location: a bucket and a (possibly empty) key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteLocation {
    bucket: String,
    key: String,
}

impl RemoteLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> FileOpsResult<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(FileOpsError::InvalidLocation(
                "bucket name must not be empty".to_string(),
            ));
        }
        if bucket.contains(KEY_SEPARATOR) {
            return Err(FileOpsError::InvalidLocation(format!(
                "bucket name must not contain '{}': {}",
                KEY_SEPARATOR, bucket
            )));
        }

        Ok(RemoteLocation {
            bucket,
            key: key.into(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// True for the bucket root and for keys ending in `/`.
    pub fn is_prefix(&self) -> bool {
        self.key.is_empty() || self.key.ends_with(KEY_SEPARATOR)
    }

    /// Key normalised for prefix listings: empty, or ending in `/`.
    pub fn prefix(&self) -> String {
        if self.is_prefix() {
            self.key.clone()
        } else {
            format!("{}{}", self.key, KEY_SEPARATOR)
        }
    }

    /// Last key segment, if the key names an object.
    pub fn file_name(&self) -> Option<&str> {
        self.key
            .rsplit(KEY_SEPARATOR)
            .next()
            .filter(|name| !name.is_empty())
    }

    /// Location of `relative` below this one, treating this key as a prefix.
    pub fn join(&self, relative: &str) -> RemoteLocation {
        RemoteLocation {
            bucket: self.bucket.clone(),
            key: format!("{}{}", self.prefix(), relative.trim_start_matches(KEY_SEPARATOR)),
        }
    }
}

impl Display for RemoteLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}{}{}{}", REMOTE_SCHEME, self.bucket, KEY_SEPARATOR, self.key)
    }
}

/// A classified path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Local(PathBuf),
    Remote(RemoteLocation),
}

impl Location {
    /// Classify a path string.
    ///
    /// `s3://bucket/key` is remote, anything else local. A remote path with an
    /// empty bucket name is rejected.
    pub fn parse(path: &str) -> FileOpsResult<Self> {
        match path.strip_prefix(REMOTE_SCHEME) {
            Some(rest) => {
                let (bucket, key) = rest.split_once(KEY_SEPARATOR).unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(FileOpsError::InvalidLocation(format!(
                        "missing bucket name in {}",
                        path
                    )));
                }
                Ok(Location::Remote(RemoteLocation::new(bucket, key)?))
            }
            None => Ok(Location::Local(PathBuf::from(path))),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            Location::Local(_) => Backend::Local,
            Location::Remote(_) => Backend::S3,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }

    pub fn as_local(&self) -> Option<&Path> {
        match self {
            Location::Local(path) => Some(path),
            Location::Remote(_) => None,
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteLocation> {
        match self {
            Location::Local(_) => None,
            Location::Remote(remote) => Some(remote),
        }
    }

    /// Bucket and key of a remote location; local locations are rejected.
    pub fn bucket_and_key(&self) -> FileOpsResult<(&str, &str)> {
        match self {
            Location::Remote(remote) => Ok((remote.bucket(), remote.key())),
            Location::Local(path) => Err(FileOpsError::InvalidLocation(format!(
                "{} is not an object-store location",
                path.display()
            ))),
        }
    }

    /// Final path segment, used to name a file copied into a directory.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Location::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            Location::Remote(remote) => remote.file_name().map(str::to_string),
        }
    }

    /// Child location. `relative` uses `/` separators for both backends.
    pub fn join(&self, relative: &str) -> Location {
        match self {
            Location::Local(path) => {
                let mut joined = path.clone();
                for segment in relative.split(KEY_SEPARATOR).filter(|s| !s.is_empty()) {
                    joined.push(segment);
                }
                Location::Local(joined)
            }
            Location::Remote(remote) => Location::Remote(remote.join(relative)),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote(remote) => write!(f, "{}", remote),
        }
    }
}

impl FromStr for Location {
    type Err = FileOpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse(s)
    }
}

/// Typed paths are taken literally and never reinterpreted as URIs.
impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::Local(path)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Location::Local(path.to_path_buf())
    }
}

impl From<RemoteLocation> for Location {
    fn from(remote: RemoteLocation) -> Self {
        Location::Remote(remote)
    }
}

/// Anything a file operation accepts as a path argument.
pub trait IntoLocation {
    fn into_location(self) -> FileOpsResult<Location>;
}

impl IntoLocation for Location {
    fn into_location(self) -> FileOpsResult<Location> {
        Ok(self)
    }
}

impl IntoLocation for &Location {
    fn into_location(self) -> FileOpsResult<Location> {
        Ok(self.clone())
    }
}

impl IntoLocation for &str {
    fn into_location(self) -> FileOpsResult<Location> {
        Location::parse(self)
    }
}

impl IntoLocation for String {
    fn into_location(self) -> FileOpsResult<Location> {
        Location::parse(&self)
    }
}

impl IntoLocation for &String {
    fn into_location(self) -> FileOpsResult<Location> {
        Location::parse(self)
    }
}

impl IntoLocation for PathBuf {
    fn into_location(self) -> FileOpsResult<Location> {
        Ok(Location::Local(self))
    }
}

impl IntoLocation for &PathBuf {
    fn into_location(self) -> FileOpsResult<Location> {
        Ok(Location::Local(self.clone()))
    }
}

impl IntoLocation for &Path {
    fn into_location(self) -> FileOpsResult<Location> {
        Ok(Location::Local(self.to_path_buf()))
    }
}

/// Classify a path string. Shorthand for [`Location::parse`].
pub fn classify(path: &str) -> FileOpsResult<Location> {
    Location::parse(path)
}

/// Split a remote path string into bucket and key.
pub fn bucket_and_key(path: &str) -> FileOpsResult<(String, String)> {
    let location = Location::parse(path)?;
    let (bucket, key) = location.bucket_and_key()?;
    Ok((bucket.to_string(), key.to_string()))
}
