use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::{CommitInfo, DiffEntry, RemoteError, RemoteSource, Result};

/// Per-repository fixture state.
#[derive(Default)]
struct RepoFixture {
    /// Symbolic specifiers (and ids, which resolve to themselves) to ids.
    commits: HashMap<String, String>,
    /// Revision id to file map; BTreeMap keeps listings sorted.
    files: HashMap<String, BTreeMap<String, Bytes>>,
    /// Diffs keyed by `(base_id, head_id)`.
    diffs: HashMap<(String, String), Vec<DiffEntry>>,
    clone_in_progress: bool,
}

/// An in-memory implementation of `RemoteSource`, intended primarily for
/// testing and local tooling.
///
/// Fetches are counted per operation so cache tests can assert how many
/// times the "remote" was actually hit.
pub struct MemoryRemote {
    repos: RwLock<HashMap<String, RepoFixture>>,
    list_calls: AtomicU32,
    content_calls: AtomicU32,
    commit_calls: AtomicU32,
}

impl MemoryRemote {
    /// Create a new empty in-memory remote.
    pub fn new() -> Self {
        Self {
            repos: RwLock::new(HashMap::new()),
            list_calls: AtomicU32::new(0),
            content_calls: AtomicU32::new(0),
            commit_calls: AtomicU32::new(0),
        }
    }

    /// Map a revision specifier to an id in `repo`. The id also resolves to
    /// itself.
    pub fn add_commit(&self, repo: &str, specifier: &str, id: &str) {
        let mut repos = self.repos.write().unwrap();
        let fixture = repos.entry(repo.to_string()).or_default();
        fixture
            .commits
            .insert(specifier.to_string(), id.to_string());
        fixture.commits.insert(id.to_string(), id.to_string());
    }

    /// Add a file at `path` for revision `id` in `repo`.
    pub fn add_file(&self, repo: &str, id: &str, path: &str, content: impl Into<Bytes>) {
        let mut repos = self.repos.write().unwrap();
        let fixture = repos.entry(repo.to_string()).or_default();
        fixture.commits.insert(id.to_string(), id.to_string());
        fixture
            .files
            .entry(id.to_string())
            .or_default()
            .insert(path.to_string(), content.into());
    }

    /// Record the diff the remote reports between two revision ids.
    pub fn add_diff(&self, repo: &str, base_id: &str, head_id: &str, entries: Vec<DiffEntry>) {
        let mut repos = self.repos.write().unwrap();
        let fixture = repos.entry(repo.to_string()).or_default();
        fixture
            .diffs
            .insert((base_id.to_string(), head_id.to_string()), entries);
    }

    /// Mark `repo` as still being cloned on the remote side.
    pub fn set_clone_in_progress(&self, repo: &str, cloning: bool) {
        let mut repos = self.repos.write().unwrap();
        repos.entry(repo.to_string()).or_default().clone_in_progress = cloning;
    }

    /// How many listing fetches have been served.
    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// How many content fetches have been served.
    pub fn content_calls(&self) -> u32 {
        self.content_calls.load(Ordering::SeqCst)
    }

    /// How many commit resolutions have been served.
    pub fn commit_calls(&self) -> u32 {
        self.commit_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteSource for MemoryRemote {
    async fn list_files(&self, repo: &str, revision_id: &str) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let repos = self.repos.read().unwrap();
        let fixture = repos.get(repo).ok_or(RemoteError::NotFound)?;
        if fixture.clone_in_progress {
            return Err(RemoteError::Unavailable);
        }
        let files = fixture.files.get(revision_id).ok_or(RemoteError::NotFound)?;
        Ok(files.keys().cloned().collect())
    }

    async fn get_file_content(&self, repo: &str, revision_id: &str, path: &str) -> Result<Bytes> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        let repos = self.repos.read().unwrap();
        let fixture = repos.get(repo).ok_or(RemoteError::NotFound)?;
        if fixture.clone_in_progress {
            return Err(RemoteError::Unavailable);
        }
        fixture
            .files
            .get(revision_id)
            .and_then(|files| files.get(path))
            .cloned()
            .ok_or(RemoteError::NotFound)
    }

    async fn get_commit(&self, repo: &str, specifier: &str) -> Result<CommitInfo> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        let repos = self.repos.read().unwrap();
        let fixture = repos.get(repo).ok_or(RemoteError::NotFound)?;
        let id = fixture
            .commits
            .get(specifier)
            .cloned()
            .ok_or(RemoteError::NotFound)?;
        Ok(CommitInfo {
            id,
            clone_in_progress: fixture.clone_in_progress,
        })
    }

    async fn get_diff(&self, repo: &str, base_id: &str, head_id: &str) -> Result<Vec<DiffEntry>> {
        let repos = self.repos.read().unwrap();
        let fixture = repos.get(repo).ok_or(RemoteError::NotFound)?;
        fixture
            .diffs
            .get(&(base_id.to_string(), head_id.to_string()))
            .cloned()
            .ok_or(RemoteError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPO: &str = "codehost.example/acme/widget";

    #[tokio::test]
    async fn test_listing_is_sorted() {
        let remote = MemoryRemote::new();
        remote.add_file(REPO, "rev1", "b/z", "1");
        remote.add_file(REPO, "rev1", "a", "2");
        remote.add_file(REPO, "rev1", "b/a", "3");

        let listing = remote.list_files(REPO, "rev1").await.unwrap();
        assert_eq!(listing, vec!["a", "b/a", "b/z"]);
    }

    #[tokio::test]
    async fn test_commit_resolution() {
        let remote = MemoryRemote::new();
        remote.add_commit(REPO, "main", "c0ffee");

        let commit = remote.get_commit(REPO, "main").await.unwrap();
        assert_eq!(commit.id, "c0ffee");
        assert!(!commit.clone_in_progress);

        // Ids resolve to themselves.
        let commit = remote.get_commit(REPO, "c0ffee").await.unwrap();
        assert_eq!(commit.id, "c0ffee");
    }

    #[tokio::test]
    async fn test_unknown_lookups_are_not_found() {
        let remote = MemoryRemote::new();
        remote.add_file(REPO, "rev1", "a", "1");

        assert!(matches!(
            remote.get_commit(REPO, "nope").await,
            Err(RemoteError::NotFound)
        ));
        assert!(matches!(
            remote.get_file_content(REPO, "rev1", "nope").await,
            Err(RemoteError::NotFound)
        ));
        assert!(matches!(
            remote.list_files("other/own/er", "rev1").await,
            Err(RemoteError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_clone_in_progress_blocks_data() {
        let remote = MemoryRemote::new();
        remote.add_commit(REPO, "main", "c0ffee");
        remote.add_file(REPO, "c0ffee", "a", "1");
        remote.set_clone_in_progress(REPO, true);

        let commit = remote.get_commit(REPO, "main").await.unwrap();
        assert!(commit.clone_in_progress);
        assert!(matches!(
            remote.list_files(REPO, "c0ffee").await,
            Err(RemoteError::Unavailable)
        ));
    }
}
