use async_trait::async_trait;

use crate::revision::RevisionRef;
use crate::scm::{Provider, ProviderError};

/// The active-workspace provider interface consumed by revision resolution
/// and by operations this subsystem defers rather than reimplements.
#[async_trait]
pub trait WorkspaceProvider: Send + Sync {
    /// The provider's current revision reference.
    fn current_revision(&self) -> RevisionRef;

    /// Execute a raw source-control command and return its output.
    async fn execute_raw_command(&self, args: &[String]) -> Result<String, ProviderError>;
}

#[async_trait]
impl WorkspaceProvider for Provider {
    fn current_revision(&self) -> RevisionRef {
        Provider::current_revision(self)
    }

    async fn execute_raw_command(&self, args: &[String]) -> Result<String, ProviderError> {
        match args.first().map(String::as_str) {
            Some("rev-parse") => Ok(self
                .current_revision()
                .effective()
                .unwrap_or_default()
                .to_string()),
            Some(command) => Err(ProviderError::UnsupportedCommand(command.to_string())),
            None => Err(ProviderError::UnsupportedCommand(String::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteSource};
    use crate::revision::RevisionCache;
    use crate::scm::ProviderKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_rev_parse_reports_current_revision() {
        let remote = Arc::new(MemoryRemote::new());
        remote.add_commit("h.io/acme/widget", "main", "c0ffee");
        let remote = remote as Arc<dyn RemoteSource>;
        let revisions = Arc::new(RevisionCache::new(Arc::clone(&remote)));
        let provider = Provider::new("h.io/acme/widget", ProviderKind::Git, revisions, remote);

        provider
            .set_revision(RevisionRef::from_specifier("main"))
            .await
            .unwrap();

        let out = provider
            .execute_raw_command(&["rev-parse".to_string()])
            .await
            .unwrap();
        assert_eq!(out, "c0ffee");
    }

    #[tokio::test]
    async fn test_unknown_command_is_rejected() {
        let remote = Arc::new(MemoryRemote::new()) as Arc<dyn RemoteSource>;
        let revisions = Arc::new(RevisionCache::new(Arc::clone(&remote)));
        let provider = Provider::new("h.io/acme/widget", ProviderKind::Git, revisions, remote);

        let err = provider
            .execute_raw_command(&["push".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::UnsupportedCommand("push".to_string()));
    }
}
