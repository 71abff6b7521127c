use crate::locator::uri::{AddressingError, RepoUri};

/// The decomposition of a resource identifier.
///
/// Derived purely from the identifier's scheme, authority, path, and query;
/// never persisted. `relative_path` never starts or ends with a separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// The identifier of the repository root the resource lives under.
    pub workspace_root: RepoUri,
    /// The repository identity: authority plus the identifying segments.
    pub repository: String,
    /// The decoded revision specifier, when the identifier carries one.
    pub revision_specifier: Option<String>,
    /// The path of the resource inside the repository; empty for the root.
    pub relative_path: String,
}

impl ResourceInfo {
    /// Decompose a parsed identifier.
    pub fn decompose(uri: &RepoUri) -> ResourceInfo {
        ResourceInfo {
            workspace_root: uri.repository_root(),
            repository: uri.repository(),
            revision_specifier: uri.revision().map(str::to_string),
            relative_path: uri.relative_path(),
        }
    }

    /// Parse and decompose a resource identifier string.
    ///
    /// `Ok(None)` means the string does not use a repository scheme and
    /// should be treated as a local resource.
    pub fn decompose_str(input: &str) -> Result<Option<ResourceInfo>, AddressingError> {
        Ok(RepoUri::parse(input)?.map(|uri| ResourceInfo::decompose(&uri)))
    }
}
