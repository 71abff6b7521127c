use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::locator::{AddressingError, RepoUri, ResourceInfo};
use crate::query_cache::{QueryError, SwrCache, SwrHit};
use crate::remote::RemoteSource;
use crate::revision::{RevisionCache, RevisionError, RevisionRef};
use crate::scm::{
    Provider, ProviderError, ProviderKind, ProviderRegistry, RegistryError,
};
use crate::tree::{materialize, FileStatNode, MaterializeOptions, TreeError};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Malformed resource identifier.
    #[error("{0}")]
    Addressing(#[from] AddressingError),

    /// The identifier does not use a repository scheme; the resource is
    /// local and not handled here.
    #[error("not a repository resource: {0}")]
    NotRepositoryResource(String),

    /// Tree materialization error.
    #[error("{0}")]
    Tree(#[from] TreeError),

    /// Revision resolution or fetch error.
    #[error("{0}")]
    Revision(#[from] RevisionError),

    /// Provider state machine error.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// Provider registry error.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// No provider is registered for the resource.
    #[error("no provider registered for '{0}'")]
    NoProvider(String),

    /// The owning provider is not a git provider.
    #[error("provider for '{0}' is not a git provider")]
    WrongProviderKind(String),

    /// The search query could not be canonicalized into a cache key.
    #[error("search query error: {0}")]
    Query(String),
}

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, WorkspaceError>;

// =============================================================================
// Context Types
// =============================================================================

/// Context for opening a Workspace.
pub struct WorkspaceContext {
    /// The loaded configuration.
    pub config: Config,
    /// The remote data source.
    pub remote: Arc<dyn RemoteSource>,
}

/// Options for directory resolution, passed through to the materializer.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Auto-expand single-descendant directory chains.
    pub resolve_fully: bool,
    /// Paths to resolve deeply.
    pub resolve_exactly: BTreeSet<String>,
}

/// A repeatable path-search query over a repository resource.
///
/// `cache_key` is the query cache namespace; switching it (e.g. per search
/// session) lets a consumer mark a previous session's results stale without
/// discarding them, so they display instantly while refreshing.
#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery {
    /// The query cache namespace.
    pub cache_key: String,
    /// The resource identifier to search under.
    pub resource: String,
    /// Substring to match against file paths.
    pub pattern: String,
    /// Maximum number of results; 0 means unlimited.
    pub max_results: u32,
}

// =============================================================================
// Workspace
// =============================================================================

/// The configured root repository's provider registration.
struct WorkspaceRoot {
    repository: String,
    provider: Arc<Provider>,
}

/// The root object owning all services of the remote repository filesystem.
///
/// Resolution flow: a resource identifier is decomposed, its revision is
/// resolved (explicit specifier first, the active provider's revision for
/// workspace-root resources otherwise), the flat listing or content is
/// fetched through the revision cache, and directory listings are
/// materialized into a tree.
pub struct Workspace {
    remote: Arc<dyn RemoteSource>,
    revisions: Arc<RevisionCache>,
    registry: ProviderRegistry,
    searches: SwrCache<Vec<String>, RevisionError>,
    root: Option<WorkspaceRoot>,
}

impl Workspace {
    /// Open a workspace: build the caches and, when the configuration names
    /// a root repository, register its provider and resolve its initial
    /// revision.
    ///
    /// A failed initial resolution leaves the provider in its unresolved
    /// state with the failure flag set; explicit-revision resources keep
    /// working regardless.
    pub async fn open(ctx: WorkspaceContext) -> Result<Workspace> {
        let revisions = if ctx.config.cache.disable {
            Arc::new(RevisionCache::uncached(Arc::clone(&ctx.remote)))
        } else {
            Arc::new(RevisionCache::new(Arc::clone(&ctx.remote)))
        };
        let registry = ProviderRegistry::new();

        let mut root = None;
        if let Some(repository) = &ctx.config.workspace.repository {
            let root_uri = RepoUri::for_repository(repository, None)?;
            let provider = Arc::new(Provider::new(
                repository,
                ProviderKind::Git,
                Arc::clone(&revisions),
                Arc::clone(&ctx.remote),
            ));
            registry.register_uri(&root_uri, Arc::clone(&provider))?;

            if let Some(revision) = &ctx.config.workspace.revision {
                if let Err(e) = provider
                    .set_revision(RevisionRef::from_specifier(revision))
                    .await
                {
                    tracing::warn!(
                        repository = repository.as_str(),
                        revision = revision.as_str(),
                        error = %e,
                        "initial revision resolution failed"
                    );
                }
            }

            root = Some(WorkspaceRoot {
                repository: repository.clone(),
                provider,
            });
        }

        Ok(Workspace {
            remote: ctx.remote,
            revisions,
            registry,
            searches: SwrCache::new(),
            root,
        })
    }

    /// The provider registry.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The configured root repository's provider, if any.
    pub fn root_provider(&self) -> Option<&Arc<Provider>> {
        self.root.as_ref().map(|root| &root.provider)
    }

    /// The remote this workspace reads from.
    pub fn remote(&self) -> &Arc<dyn RemoteSource> {
        &self.remote
    }

    /// Resolve a resource into a directory tree node (or a file leaf).
    pub async fn resolve(&self, resource: &str, options: &ResolveOptions) -> Result<FileStatNode> {
        let (info, revision) = self.locate(resource)?;
        let id = self.revisions.pin(&info.repository, &revision).await?;
        let pinned = revision.with_id(&id);

        let listing = self.revisions.list_files(&info.repository, &pinned).await?;
        let base = info.workspace_root.with_revision(Some(id.as_str()));

        let materialize_options = MaterializeOptions {
            parent_path: if info.relative_path.is_empty() {
                None
            } else {
                Some(info.relative_path.clone())
            },
            resolve_fully: options.resolve_fully,
            resolve_exactly: options.resolve_exactly.clone(),
        };

        materialize(&base, &listing, &materialize_options).map_err(|e| match e {
            TreeError::NotFound { path } => {
                WorkspaceError::Revision(RevisionError::DirectoryNotFound { path })
            }
            other => WorkspaceError::Tree(other),
        })
    }

    /// Read a file resource's content.
    pub async fn read(&self, resource: &str) -> Result<Bytes> {
        let (info, revision) = self.locate(resource)?;
        Ok(self
            .revisions
            .read_file(&info.repository, &revision, &info.relative_path)
            .await?)
    }

    /// Whether the resource exists at its revision. Typed not-found
    /// conditions map to `false`; every other failure propagates.
    pub async fn exists(&self, resource: &str) -> Result<bool> {
        match self.resolve(resource, &ResolveOptions::default()).await {
            Ok(_) => Ok(true),
            Err(WorkspaceError::Revision(
                RevisionError::FileNotFound { .. } | RevisionError::DirectoryNotFound { .. },
            )) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Run a path search, stale-while-revalidate cached.
    ///
    /// A repeated query joins or reuses the cached result; after
    /// [`Workspace::mark_search_stale`], the previous result is returned
    /// immediately (`stale` set) while the listing is re-filtered in the
    /// background.
    pub async fn search(&self, query: &SearchQuery) -> Result<SwrHit<Vec<String>>> {
        let (info, revision) = self.locate(&query.resource)?;

        let revisions = Arc::clone(&self.revisions);
        let repository = info.repository.clone();
        let prefix = if info.relative_path.is_empty() {
            String::new()
        } else {
            format!("{}/", info.relative_path)
        };
        let pattern = query.pattern.clone();
        let max_results = query.max_results;

        self.searches
            .get(&query.cache_key, query, move || async move {
                let listing = revisions.list_files(&repository, &revision).await?;
                let mut matches: Vec<String> = listing
                    .iter()
                    .filter(|path| path.starts_with(&prefix) && path.contains(&pattern))
                    .cloned()
                    .collect();
                if max_results > 0 {
                    matches.truncate(max_results as usize);
                }
                Ok(matches)
            })
            .await
            .map_err(|e| match e {
                QueryError::Key(msg) => WorkspaceError::Query(msg),
                QueryError::Operation(e) => WorkspaceError::Revision(e),
            })
    }

    /// Whether a resolved result is cached for this search query.
    pub fn is_search_cached(&self, query: &SearchQuery) -> bool {
        self.searches.is_cached(&query.cache_key, query)
    }

    /// Mark every search result under `cache_key` stale.
    pub fn mark_search_stale(&self, cache_key: &str) {
        self.searches.mark_stale(cache_key);
    }

    /// Drop every search result under `cache_key`.
    pub fn invalidate_search(&self, cache_key: &str) {
        self.searches.invalidate(cache_key);
    }

    /// Change the diff base of the provider owning `resource`.
    pub async fn set_diff_base(&self, resource: &str, base: RevisionRef) -> Result<()> {
        let provider = self.owning_git_provider(resource)?;
        Ok(provider.set_diff_base(base).await?)
    }

    /// Change the revision of the provider owning `resource`.
    pub async fn set_revision(&self, resource: &str, input: RevisionRef) -> Result<RevisionRef> {
        let provider = self.owning_git_provider(resource)?;
        Ok(provider.set_revision(input).await?)
    }

    /// Decompose a resource identifier and determine its revision.
    fn locate(&self, resource: &str) -> Result<(ResourceInfo, RevisionRef)> {
        let uri = RepoUri::parse(resource)?
            .ok_or_else(|| WorkspaceError::NotRepositoryResource(resource.to_string()))?;
        let info = ResourceInfo::decompose(&uri);

        let active = self
            .root
            .as_ref()
            .filter(|root| root.repository == info.repository)
            .map(|root| root.provider.current_revision());
        let revision = self.revisions.resolve_revision(&info, active.as_ref())?;
        Ok((info, revision))
    }

    /// Look up the provider owning `resource` and require the git kind.
    fn owning_git_provider(&self, resource: &str) -> Result<Arc<Provider>> {
        let uri = RepoUri::parse(resource)?
            .ok_or_else(|| WorkspaceError::NotRepositoryResource(resource.to_string()))?;
        let provider = self
            .registry
            .lookup_uri(&uri)
            .ok_or_else(|| WorkspaceError::NoProvider(resource.to_string()))?;
        if provider.kind() != ProviderKind::Git {
            return Err(WorkspaceError::WrongProviderKind(resource.to_string()));
        }
        Ok(provider)
    }
}
