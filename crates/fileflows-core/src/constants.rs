//! Shared constants

/// URI prefix that marks a path as an object-store location.
pub const REMOTE_SCHEME: &str = "s3://";

/// Region used when neither `S3_REGION` nor `AWS_REGION` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Separator between bucket and key, and between key segments.
pub const KEY_SEPARATOR: char = '/';
