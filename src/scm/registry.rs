use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::locator::RepoUri;
use crate::scm::provider::Provider;

/// Error type for registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A provider already owns this root folder.
    RootAlreadyRegistered(String),
    /// The root folder has no path segments.
    EmptyRoot,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::RootAlreadyRegistered(root) => {
                write!(f, "a provider is already registered at '{}'", root)
            }
            RegistryError::EmptyRoot => write!(f, "root folder has no path segments"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Handle returned by [`ProviderRegistry::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderHandle(u64);

/// One trie level, keyed by path segment.
///
/// Keying by whole segments (not string prefixes) is what keeps a root like
/// `/repo-a` from matching resources under `/repo-a-extended`.
#[derive(Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    registration: Option<u64>,
}

struct Registration {
    segments: Vec<String>,
    provider: Arc<Provider>,
}

struct RegistryInner {
    root: TrieNode,
    registrations: HashMap<u64, Registration>,
    next_id: u64,
}

/// Maps resource paths to the provider responsible for them.
///
/// Ownership lookup is longest-prefix match over registered root folders,
/// because sub-resources live under the root.
pub struct ProviderRegistry {
    inner: Mutex<RegistryInner>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                root: TrieNode::default(),
                registrations: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Register a provider as the owner of `root`.
    ///
    /// At most one provider may own a given root folder at a time.
    pub fn register(
        &self,
        root: &str,
        provider: Arc<Provider>,
    ) -> Result<ProviderHandle, RegistryError> {
        let segments = split_segments(root);
        if segments.is_empty() {
            return Err(RegistryError::EmptyRoot);
        }

        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;

        let mut node = &mut inner.root;
        for segment in &segments {
            node = node.children.entry(segment.clone()).or_default();
        }
        if node.registration.is_some() {
            return Err(RegistryError::RootAlreadyRegistered(root.to_string()));
        }
        node.registration = Some(id);

        inner.next_id += 1;
        inner
            .registrations
            .insert(id, Registration { segments, provider });
        Ok(ProviderHandle(id))
    }

    /// Register a provider at a resource identifier's repository root.
    pub fn register_uri(
        &self,
        root: &RepoUri,
        provider: Arc<Provider>,
    ) -> Result<ProviderHandle, RegistryError> {
        self.register(&root.registry_path(), provider)
    }

    /// Find the provider owning `path` by longest-prefix match.
    pub fn lookup(&self, path: &str) -> Option<Arc<Provider>> {
        let inner = self.inner.lock().unwrap();

        let mut node = &inner.root;
        let mut best = node.registration;
        for segment in split_segments(path) {
            match node.children.get(&segment) {
                Some(child) => {
                    node = child;
                    if node.registration.is_some() {
                        best = node.registration;
                    }
                }
                None => break,
            }
        }

        best.and_then(|id| inner.registrations.get(&id))
            .map(|reg| Arc::clone(&reg.provider))
    }

    /// Find the provider owning a resource identifier.
    pub fn lookup_uri(&self, resource: &RepoUri) -> Option<Arc<Provider>> {
        self.lookup(&resource.registry_path())
    }

    /// Remove a registration. Idempotent: unregistering a handle twice is
    /// a no-op.
    pub fn unregister(&self, handle: ProviderHandle) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(registration) = inner.registrations.remove(&handle.0) {
            clear_registration(&mut inner.root, &registration.segments);
        }
    }

    /// The number of registered providers.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().registrations.len()
    }

    /// Whether the registry has no providers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Clear a registration and prune trie nodes left empty behind it.
fn clear_registration(node: &mut TrieNode, segments: &[String]) {
    match segments.split_first() {
        None => node.registration = None,
        Some((first, rest)) => {
            if let Some(child) = node.children.get_mut(first) {
                clear_registration(child, rest);
                if child.registration.is_none() && child.children.is_empty() {
                    node.children.remove(first);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteSource};
    use crate::revision::RevisionCache;
    use crate::scm::provider::ProviderKind;

    fn provider(repository: &str) -> Arc<Provider> {
        let remote = Arc::new(MemoryRemote::new()) as Arc<dyn RemoteSource>;
        let revisions = Arc::new(RevisionCache::new(Arc::clone(&remote)));
        Arc::new(Provider::new(
            repository,
            ProviderKind::Git,
            revisions,
            remote,
        ))
    }

    #[test]
    fn test_longest_prefix_is_segment_aware() {
        let registry = ProviderRegistry::new();
        registry.register("/repo-a", provider("repo-a")).unwrap();
        registry
            .register("/repo-a-extended", provider("repo-a-extended"))
            .unwrap();

        let owner = registry.lookup("/repo-a-extended/src/file").unwrap();
        assert_eq!(owner.repository(), "repo-a-extended");

        let owner = registry.lookup("/repo-a/src/file").unwrap();
        assert_eq!(owner.repository(), "repo-a");
    }

    #[test]
    fn test_deepest_registration_wins() {
        let registry = ProviderRegistry::new();
        registry.register("a", provider("outer")).unwrap();
        registry.register("a/b/c", provider("inner")).unwrap();

        assert_eq!(registry.lookup("a/b/c/d").unwrap().repository(), "inner");
        assert_eq!(registry.lookup("a/b").unwrap().repository(), "outer");
        assert_eq!(registry.lookup("a").unwrap().repository(), "outer");
    }

    #[test]
    fn test_lookup_miss() {
        let registry = ProviderRegistry::new();
        registry.register("a/b", provider("p")).unwrap();
        assert!(registry.lookup("x/y").is_none());
        // A shared prefix shorter than the root is not a match.
        assert!(registry.lookup("a").is_none());
    }

    #[test]
    fn test_duplicate_root_is_rejected() {
        let registry = ProviderRegistry::new();
        registry.register("a/b", provider("first")).unwrap();
        let err = registry.register("a/b", provider("second")).unwrap_err();
        assert_eq!(err, RegistryError::RootAlreadyRegistered("a/b".to_string()));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ProviderRegistry::new();
        let handle = registry.register("a/b", provider("p")).unwrap();

        registry.unregister(handle);
        assert!(registry.lookup("a/b/c").is_none());
        assert!(registry.is_empty());

        // Second unregister with the same handle is a no-op.
        registry.unregister(handle);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_keeps_sibling_registrations() {
        let registry = ProviderRegistry::new();
        let handle = registry.register("a/b", provider("b")).unwrap();
        registry.register("a/c", provider("c")).unwrap();

        registry.unregister(handle);
        assert!(registry.lookup("a/b/x").is_none());
        assert_eq!(registry.lookup("a/c/x").unwrap().repository(), "c");
    }

    #[test]
    fn test_register_by_uri() {
        let registry = ProviderRegistry::new();
        let root = RepoUri::for_repository("h.io/acme/widget", None).unwrap();
        registry.register_uri(&root, provider("widget")).unwrap();

        let resource = root.join("src/lib.rs");
        assert_eq!(
            registry.lookup_uri(&resource).unwrap().repository(),
            "widget"
        );
    }
}
