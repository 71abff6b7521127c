/// Remote service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL of the remote repository service.
    pub endpoint: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: super::read_config::DEFAULT_REMOTE_ENDPOINT.to_string(),
        }
    }
}

/// Workspace configuration: the root repository the workbench is attached
/// to, if any, and its initial revision.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkspaceSettings {
    /// The "authority/owner/name" identity of the root repository.
    pub repository: Option<String>,
    /// The initial revision specifier for the root provider.
    pub revision: Option<String>,
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheSettings {
    /// Disable retaining fetched listings and contents.
    pub disable: bool,
}

/// The complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub workspace: WorkspaceSettings,
    pub cache: CacheSettings,
}
