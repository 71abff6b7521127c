use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::locator::ResourceInfo;
use crate::remote::{RemoteError, RemoteSource};
use crate::revision::types::RevisionRef;
use crate::util::Inflight;

// =============================================================================
// Error Types
// =============================================================================

/// Error type for revision resolution and revision-keyed fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionError {
    /// The resource carries no revision and no active workspace context can
    /// supply one.
    Unresolvable,
    /// No file exists at the path for the resolved revision.
    FileNotFound { path: String },
    /// No directory exists at the path for the resolved revision.
    DirectoryNotFound { path: String },
    /// The revision specifier does not resolve in the repository.
    RevisionNotFound {
        repository: String,
        specifier: String,
    },
    /// The repository is still being cloned on the remote side.
    CloneInProgress { repository: String },
    /// Any other remote failure.
    Remote(String),
}

impl fmt::Display for RevisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionError::Unresolvable => {
                write!(f, "cannot determine a revision for this resource")
            }
            RevisionError::FileNotFound { path } => {
                write!(f, "no file at '{}' for this revision", path)
            }
            RevisionError::DirectoryNotFound { path } => {
                write!(f, "no directory at '{}' for this revision", path)
            }
            RevisionError::RevisionNotFound {
                repository,
                specifier,
            } => {
                write!(f, "revision '{}' not found in '{}'", specifier, repository)
            }
            RevisionError::CloneInProgress { repository } => {
                write!(
                    f,
                    "repository '{}' is still being cloned; retry shortly",
                    repository
                )
            }
            RevisionError::Remote(msg) => write!(f, "remote error: {}", msg),
        }
    }
}

impl std::error::Error for RevisionError {}

/// Result type for revision cache operations.
pub type Result<T> = std::result::Result<T, RevisionError>;

// =============================================================================
// RevisionCache
// =============================================================================

type ListingKey = (String, String);
type ContentKey = (String, String, String);

/// Revision resolution plus process-lifetime caching of listings and
/// contents.
///
/// Both caches are keyed by immutable identity tuples - `(repository,
/// revision_id)` for listings, `(repository, revision_id, path)` for
/// contents - so entries never go stale and are kept for the lifetime of
/// the process. Fetches are single-flight joined: concurrent callers for
/// the same key share one remote request, and a failed fetch is evicted
/// rather than cached, so the next caller retries cleanly.
pub struct RevisionCache {
    remote: Arc<dyn RemoteSource>,
    /// When false, results are not retained; single-flight joining still
    /// applies to concurrent callers.
    store_enabled: bool,
    listings: Mutex<HashMap<ListingKey, Arc<Vec<String>>>>,
    contents: Mutex<HashMap<ContentKey, Bytes>>,
    listing_flights: Inflight<ListingKey, Arc<Vec<String>>, RevisionError>,
    content_flights: Inflight<ContentKey, Bytes, RevisionError>,
    commit_flights: Inflight<(String, String), String, RevisionError>,
}

impl RevisionCache {
    /// Create a new cache over the given remote.
    pub fn new(remote: Arc<dyn RemoteSource>) -> Self {
        Self::with_store(remote, true)
    }

    /// Create a cache that joins concurrent fetches but retains nothing,
    /// for configurations that disable caching.
    pub fn uncached(remote: Arc<dyn RemoteSource>) -> Self {
        Self::with_store(remote, false)
    }

    fn with_store(remote: Arc<dyn RemoteSource>, store_enabled: bool) -> Self {
        Self {
            remote,
            store_enabled,
            listings: Mutex::new(HashMap::new()),
            contents: Mutex::new(HashMap::new()),
            listing_flights: Inflight::new(),
            content_flights: Inflight::new(),
            commit_flights: Inflight::new(),
        }
    }

    /// Determine the revision for a resource.
    ///
    /// An explicit specifier on the resource wins verbatim. Otherwise the
    /// active workspace provider's current revision applies when the caller
    /// supplies one. A resource outside the active workspace with no
    /// explicit revision is not resolvable, deliberately.
    pub fn resolve_revision(
        &self,
        info: &ResourceInfo,
        active: Option<&RevisionRef>,
    ) -> Result<RevisionRef> {
        if let Some(spec) = &info.revision_specifier {
            return Ok(RevisionRef::from_specifier(spec));
        }
        match active {
            Some(revision) => Ok(revision.clone()),
            None => Err(RevisionError::Unresolvable),
        }
    }

    /// Resolve a revision reference to an immutable id, consulting the
    /// remote only for references that do not already carry one.
    pub async fn pin(&self, repository: &str, revision: &RevisionRef) -> Result<String> {
        if let Some(id) = &revision.id {
            return Ok(id.clone());
        }
        let specifier = revision
            .effective()
            .ok_or(RevisionError::Unresolvable)?
            .to_string();

        let key = (repository.to_string(), specifier.clone());
        let remote = Arc::clone(&self.remote);
        self.commit_flights
            .run(key, move || {
                let remote = Arc::clone(&remote);
                let repository = repository.to_string();
                let specifier = specifier.clone();
                async move {
                    tracing::debug!(
                        repository = repository.as_str(),
                        specifier = specifier.as_str(),
                        "resolving revision"
                    );
                    let commit = remote
                        .get_commit(&repository, &specifier)
                        .await
                        .map_err(|e| revision_fetch_error(e, &repository, &specifier))?;
                    if commit.clone_in_progress {
                        return Err(RevisionError::CloneInProgress { repository });
                    }
                    Ok(commit.id)
                }
            })
            .await
    }

    /// The flat file listing of a repository at a revision.
    ///
    /// Fetched at most once per distinct `(repository, revision_id)` pair;
    /// the same listing serves every subtree query, which is why the key
    /// carries no path.
    pub async fn list_files(
        &self,
        repository: &str,
        revision: &RevisionRef,
    ) -> Result<Arc<Vec<String>>> {
        let id = self.pin(repository, revision).await?;
        let key = (repository.to_string(), id);

        if self.store_enabled {
            if let Some(listing) = self.listings.lock().unwrap().get(&key) {
                return Ok(Arc::clone(listing));
            }
        }

        let remote = Arc::clone(&self.remote);
        let fetch_key = key.clone();
        let listing = self
            .listing_flights
            .run(key.clone(), move || {
                let remote = Arc::clone(&remote);
                let key = fetch_key.clone();
                async move {
                    tracing::debug!(
                        repository = key.0.as_str(),
                        revision = key.1.as_str(),
                        "fetching file listing"
                    );
                    let paths = remote
                        .list_files(&key.0, &key.1)
                        .await
                        .map_err(|e| revision_fetch_error(e, &key.0, &key.1))?;
                    Ok(Arc::new(paths))
                }
            })
            .await?;

        if self.store_enabled {
            self.listings
                .lock()
                .unwrap()
                .insert(key, Arc::clone(&listing));
        }
        Ok(listing)
    }

    /// The content of one file at a revision.
    ///
    /// Content for an immutable revision id is fetched at most once per
    /// process lifetime; concurrent identical calls join a single fetch.
    pub async fn read_file(
        &self,
        repository: &str,
        revision: &RevisionRef,
        path: &str,
    ) -> Result<Bytes> {
        let id = self.pin(repository, revision).await?;
        let key = (repository.to_string(), id, path.to_string());

        if self.store_enabled {
            if let Some(content) = self.contents.lock().unwrap().get(&key) {
                return Ok(content.clone());
            }
        }

        let remote = Arc::clone(&self.remote);
        let fetch_key = key.clone();
        let content = self
            .content_flights
            .run(key.clone(), move || {
                let remote = Arc::clone(&remote);
                let key = fetch_key.clone();
                async move {
                    tracing::debug!(
                        repository = key.0.as_str(),
                        revision = key.1.as_str(),
                        path = key.2.as_str(),
                        "fetching file content"
                    );
                    remote
                        .get_file_content(&key.0, &key.1, &key.2)
                        .await
                        .map_err(|e| match e {
                            RemoteError::NotFound => RevisionError::FileNotFound {
                                path: key.2.clone(),
                            },
                            RemoteError::Unavailable => RevisionError::CloneInProgress {
                                repository: key.0.clone(),
                            },
                            other => RevisionError::Remote(other.to_string()),
                        })
                }
            })
            .await?;

        if self.store_enabled {
            self.contents.lock().unwrap().insert(key, content.clone());
        }
        Ok(content)
    }
}

/// Map a remote failure while resolving or listing a revision.
fn revision_fetch_error(e: RemoteError, repository: &str, specifier: &str) -> RevisionError {
    match e {
        RemoteError::NotFound => RevisionError::RevisionNotFound {
            repository: repository.to_string(),
            specifier: specifier.to_string(),
        },
        RemoteError::Unavailable => RevisionError::CloneInProgress {
            repository: repository.to_string(),
        },
        other => RevisionError::Remote(other.to_string()),
    }
}
