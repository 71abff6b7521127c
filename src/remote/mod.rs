//! Remote data source traits and types.
//!
//! A [`RemoteSource`] is the narrow interface to the code-hosting service:
//! flat file listings, file contents, commit resolution, and diffs between
//! two revisions. Implementations exist for an HTTP service and for an
//! in-memory fixture used by tests and tools.

mod http_source;
mod memory_source;

pub use http_source::HttpRemote;
pub use memory_source::MemoryRemote;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Error type for remote source operations.
#[derive(Debug)]
pub enum RemoteError {
    /// The repository, revision, or path was not found.
    NotFound,
    /// The repository exists but its data is not yet available (e.g. the
    /// remote side is still cloning it).
    Unavailable,
    /// A transport-level failure.
    Http(String),
    /// A custom error message.
    Other(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::NotFound => write!(f, "not found"),
            RemoteError::Unavailable => write!(f, "not yet available"),
            RemoteError::Http(msg) => write!(f, "HTTP error: {}", msg),
            RemoteError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Result type for remote source operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// A resolved commit on the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// The immutable content-addressed revision id.
    pub id: String,
    /// Whether the remote is still cloning the repository; data for this
    /// commit cannot be served yet when set.
    #[serde(default)]
    pub clone_in_progress: bool,
}

/// The change kind of a single diff entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffStatus {
    /// Added file (A).
    Added,
    /// Copied file (C).
    Copied,
    /// Deleted file (D).
    Deleted,
    /// Modified file (M).
    Modified,
    /// Renamed file (R).
    Renamed,
    /// Any status the remote reported that is not understood.
    Unknown,
}

impl DiffStatus {
    /// Parse the single-letter status code the remote reports.
    pub fn from_code(code: char) -> DiffStatus {
        match code {
            'A' => DiffStatus::Added,
            'C' => DiffStatus::Copied,
            'D' => DiffStatus::Deleted,
            'M' => DiffStatus::Modified,
            'R' => DiffStatus::Renamed,
            _ => DiffStatus::Unknown,
        }
    }

    /// The single-letter status code.
    pub fn code(&self) -> char {
        match self {
            DiffStatus::Added => 'A',
            DiffStatus::Copied => 'C',
            DiffStatus::Deleted => 'D',
            DiffStatus::Modified => 'M',
            DiffStatus::Renamed => 'R',
            DiffStatus::Unknown => '?',
        }
    }
}

/// One entry of a diff between two revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// The change kind.
    pub status: DiffStatus,
    /// The path at the head revision (the base-revision path for deletes).
    pub path: String,
    /// The path at the base revision, for renames and copies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
}

/// The remote code-hosting service.
///
/// All operations are asynchronous and idempotent for a fixed revision id,
/// which is what makes cache-level request joining safe. Implementations do
/// not retry; retry policy belongs to the transport.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// The complete flat file listing of a repository at a revision, as a
    /// lexicographically sorted sequence of file paths with no directory
    /// entries.
    async fn list_files(&self, repo: &str, revision_id: &str) -> Result<Vec<String>>;

    /// The content of one file at a revision.
    ///
    /// Returns `RemoteError::NotFound` if no file exists at the path.
    async fn get_file_content(&self, repo: &str, revision_id: &str, path: &str) -> Result<Bytes>;

    /// Resolve a revision specifier (symbolic or immutable) to a commit.
    async fn get_commit(&self, repo: &str, specifier: &str) -> Result<CommitInfo>;

    /// The diff between two resolved revisions.
    async fn get_diff(&self, repo: &str, base_id: &str, head_id: &str) -> Result<Vec<DiffEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for status in [
            DiffStatus::Added,
            DiffStatus::Copied,
            DiffStatus::Deleted,
            DiffStatus::Modified,
            DiffStatus::Renamed,
        ] {
            assert_eq!(DiffStatus::from_code(status.code()), status);
        }
        assert_eq!(DiffStatus::from_code('X'), DiffStatus::Unknown);
    }
}
