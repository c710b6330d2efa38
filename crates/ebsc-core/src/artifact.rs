use std::path::PathBuf;

/// A saved configuration materialised on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
    /// Hex SHA-256 of the bytes written; informational, nothing verifies it.
    pub sha256: String,
}
