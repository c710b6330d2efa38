use thiserror::Error;

/// Failures callers need to tell apart; everything else travels as plain `anyhow` context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackupError {
    #[error("no environments found")]
    NoEnvironments,
    #[error("no environments matched filter {filter:?}")]
    NoMatches { filter: String },
    #[error("no bucket found matching {filter:?}")]
    BucketNotFound { filter: String },
    #[error("object not found: s3://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },
    #[error("timestamp must be 14 digits (YYYYMMDDhhmmss): {0:?}")]
    InvalidTimestamp(String),
    #[error("invalid region")]
    InvalidRegion,
    #[error("{failed} of {total} environments failed to back up")]
    EnvironmentsFailed { failed: usize, total: usize },
}
