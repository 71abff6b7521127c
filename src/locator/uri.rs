use std::fmt;

use percent_encoding::{percent_decode_str, percent_encode, NON_ALPHANUMERIC};

/// Number of leading path segments (after the authority) that identify the
/// repository root. The identity is "owner/name"-shaped for both schemes.
pub const REPOSITORY_SEGMENTS: usize = 2;

/// Error type for resource identifier construction and parsing.
///
/// These indicate a malformed identifier, which is an upstream construction
/// bug rather than a user condition. Callers must surface them, never
/// swallow them into an "absent" result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressingError {
    /// The identifier has no authority component.
    MissingAuthority(String),
    /// The identifier's path does not contain enough segments to name a
    /// repository.
    IncompleteRepository(String),
    /// The identifier carries a fragment, which the schemes disallow.
    FragmentNotAllowed(String),
    /// The versioned scheme requires a revision query and none was present.
    RevisionRequired(String),
    /// The unversioned scheme disallows a revision query.
    RevisionNotAllowed(String),
    /// The revision query is not valid percent-encoded UTF-8.
    InvalidEncoding(String),
}

impl fmt::Display for AddressingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressingError::MissingAuthority(uri) => {
                write!(f, "resource identifier has no authority: {}", uri)
            }
            AddressingError::IncompleteRepository(uri) => {
                write!(f, "resource identifier does not name a repository: {}", uri)
            }
            AddressingError::FragmentNotAllowed(uri) => {
                write!(f, "resource identifier must not carry a fragment: {}", uri)
            }
            AddressingError::RevisionRequired(uri) => {
                write!(f, "versioned resource identifier has no revision: {}", uri)
            }
            AddressingError::RevisionNotAllowed(uri) => {
                write!(f, "unversioned resource identifier carries a revision: {}", uri)
            }
            AddressingError::InvalidEncoding(query) => {
                write!(f, "revision query is not valid percent-encoded UTF-8: {}", query)
            }
        }
    }
}

impl std::error::Error for AddressingError {}

/// Result type for addressing operations.
pub type Result<T> = std::result::Result<T, AddressingError>;

/// The recognized resource identifier schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoScheme {
    /// `repo://` - no revision, the active provider's revision applies.
    Repo,
    /// `repo+version://` - explicit revision in the query component.
    RepoVersion,
}

impl RepoScheme {
    /// The scheme string as it appears before `://`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoScheme::Repo => "repo",
            RepoScheme::RepoVersion => "repo+version",
        }
    }

    fn from_scheme(s: &str) -> Option<Self> {
        match s {
            "repo" => Some(RepoScheme::Repo),
            "repo+version" => Some(RepoScheme::RepoVersion),
            _ => None,
        }
    }
}

/// A parsed resource identifier for a remote repository resource.
///
/// The authority plus the first [`REPOSITORY_SEGMENTS`] path segments name
/// the repository; any further segments are the path of a resource inside
/// it. The revision, when present, is stored decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoUri {
    scheme: RepoScheme,
    authority: String,
    segments: Vec<String>,
    revision: Option<String>,
}

impl RepoUri {
    /// Parse a resource identifier.
    ///
    /// Returns `Ok(None)` when the scheme is not one of the recognized
    /// repository schemes, signaling "not a remote workspace resource".
    /// Returns an error for a malformed identifier under a recognized
    /// scheme.
    pub fn parse(input: &str) -> Result<Option<RepoUri>> {
        let Some((scheme_str, rest)) = input.split_once("://") else {
            return Ok(None);
        };
        let Some(scheme) = RepoScheme::from_scheme(scheme_str) else {
            return Ok(None);
        };

        if rest.contains('#') {
            return Err(AddressingError::FragmentNotAllowed(input.to_string()));
        }

        let (body, query) = match rest.split_once('?') {
            Some((body, query)) => (body, Some(query)),
            None => (rest, None),
        };

        let (authority, path) = body.split_once('/').unwrap_or((body, ""));
        if authority.is_empty() {
            return Err(AddressingError::MissingAuthority(input.to_string()));
        }

        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.len() < REPOSITORY_SEGMENTS {
            return Err(AddressingError::IncompleteRepository(input.to_string()));
        }

        let revision = match query {
            Some(q) if !q.is_empty() => Some(
                percent_decode_str(q)
                    .decode_utf8()
                    .map_err(|_| AddressingError::InvalidEncoding(q.to_string()))?
                    .into_owned(),
            ),
            _ => None,
        };

        match (scheme, &revision) {
            (RepoScheme::RepoVersion, None) => {
                return Err(AddressingError::RevisionRequired(input.to_string()));
            }
            (RepoScheme::Repo, Some(_)) => {
                return Err(AddressingError::RevisionNotAllowed(input.to_string()));
            }
            _ => {}
        }

        Ok(Some(RepoUri {
            scheme,
            authority: authority.to_string(),
            segments,
            revision,
        }))
    }

    /// Construct an identifier for a repository root.
    ///
    /// `repository` is the "authority/owner/name" identity. The scheme is
    /// chosen by the presence of `revision`.
    pub fn for_repository(repository: &str, revision: Option<&str>) -> Result<RepoUri> {
        let parts: Vec<&str> = repository.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() != REPOSITORY_SEGMENTS + 1 {
            return Err(AddressingError::IncompleteRepository(repository.to_string()));
        }
        Ok(RepoUri {
            scheme: if revision.is_some() {
                RepoScheme::RepoVersion
            } else {
                RepoScheme::Repo
            },
            authority: parts[0].to_string(),
            segments: parts[1..].iter().map(|s| s.to_string()).collect(),
            revision: revision.map(str::to_string),
        })
    }

    /// The identifier's scheme.
    pub fn scheme(&self) -> RepoScheme {
        self.scheme
    }

    /// The authority component.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// All path segments, repository identity included.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The decoded revision specifier, if the identifier carries one.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// The repository identity: authority plus the identifying segments.
    pub fn repository(&self) -> String {
        let mut out = self.authority.clone();
        for seg in &self.segments[..REPOSITORY_SEGMENTS] {
            out.push('/');
            out.push_str(seg);
        }
        out
    }

    /// The path of the resource inside the repository. Empty for the
    /// repository root; never starts or ends with `/`.
    pub fn relative_path(&self) -> String {
        self.segments[REPOSITORY_SEGMENTS..].join("/")
    }

    /// An identifier for the repository root, dropping any resource path
    /// but keeping scheme and revision.
    pub fn repository_root(&self) -> RepoUri {
        RepoUri {
            scheme: self.scheme,
            authority: self.authority.clone(),
            segments: self.segments[..REPOSITORY_SEGMENTS].to_vec(),
            revision: self.revision.clone(),
        }
    }

    /// An identifier for a resource at `path` relative to this one.
    pub fn join(&self, path: &str) -> RepoUri {
        let mut joined = self.clone();
        joined
            .segments
            .extend(path.split('/').filter(|s| !s.is_empty()).map(str::to_string));
        joined
    }

    /// The same resource with a different (or no) revision. The scheme
    /// follows the revision's presence.
    pub fn with_revision(&self, revision: Option<&str>) -> RepoUri {
        RepoUri {
            scheme: if revision.is_some() {
                RepoScheme::RepoVersion
            } else {
                RepoScheme::Repo
            },
            authority: self.authority.clone(),
            segments: self.segments.clone(),
            revision: revision.map(str::to_string),
        }
    }

    /// A slash-separated key for prefix registries: the authority followed
    /// by every path segment.
    pub fn registry_path(&self) -> String {
        let mut out = self.authority.clone();
        for seg in &self.segments {
            out.push('/');
            out.push_str(seg);
        }
        out
    }
}

impl fmt::Display for RepoUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme.as_str(), self.authority)?;
        for seg in &self.segments {
            write!(f, "/{}", seg)?;
        }
        if let Some(rev) = &self.revision {
            write!(f, "?{}", percent_encode(rev.as_bytes(), NON_ALPHANUMERIC))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unversioned() {
        let uri = RepoUri::parse("repo://codehost.example/acme/widget/src/lib.rs")
            .unwrap()
            .unwrap();
        assert_eq!(uri.scheme(), RepoScheme::Repo);
        assert_eq!(uri.authority(), "codehost.example");
        assert_eq!(uri.repository(), "codehost.example/acme/widget");
        assert_eq!(uri.relative_path(), "src/lib.rs");
        assert_eq!(uri.revision(), None);
    }

    #[test]
    fn test_parse_versioned() {
        let uri = RepoUri::parse("repo+version://codehost.example/acme/widget/README.md?main")
            .unwrap()
            .unwrap();
        assert_eq!(uri.scheme(), RepoScheme::RepoVersion);
        assert_eq!(uri.revision(), Some("main"));
        assert_eq!(uri.relative_path(), "README.md");
    }

    #[test]
    fn test_parse_decodes_reserved_characters() {
        let uri =
            RepoUri::parse("repo+version://h.io/acme/widget/a.rs?feature%2Fx%3A2").unwrap().unwrap();
        assert_eq!(uri.revision(), Some("feature/x:2"));
    }

    #[test]
    fn test_foreign_scheme_is_absent() {
        assert_eq!(RepoUri::parse("file:///tmp/x").unwrap(), None);
        assert_eq!(RepoUri::parse("https://codehost.example/a/b").unwrap(), None);
        assert_eq!(RepoUri::parse("not a uri at all").unwrap(), None);
    }

    #[test]
    fn test_fragment_is_an_error() {
        let err = RepoUri::parse("repo://h.io/acme/widget/a.rs#frag").unwrap_err();
        assert!(matches!(err, AddressingError::FragmentNotAllowed(_)));
    }

    #[test]
    fn test_missing_authority_is_an_error() {
        let err = RepoUri::parse("repo:///acme/widget").unwrap_err();
        assert!(matches!(err, AddressingError::MissingAuthority(_)));
    }

    #[test]
    fn test_incomplete_repository_is_an_error() {
        let err = RepoUri::parse("repo://h.io/acme").unwrap_err();
        assert!(matches!(err, AddressingError::IncompleteRepository(_)));
    }

    #[test]
    fn test_versioned_scheme_requires_revision() {
        let err = RepoUri::parse("repo+version://h.io/acme/widget/a.rs").unwrap_err();
        assert!(matches!(err, AddressingError::RevisionRequired(_)));
    }

    #[test]
    fn test_unversioned_scheme_rejects_revision() {
        let err = RepoUri::parse("repo://h.io/acme/widget/a.rs?main").unwrap_err();
        assert!(matches!(err, AddressingError::RevisionNotAllowed(_)));
    }

    #[test]
    fn test_round_trip_with_reserved_revision() {
        let original = RepoUri::for_repository("h.io/acme/widget", Some("feature/x:y z"))
            .unwrap()
            .join("src/deep/mod.rs");
        let parsed = RepoUri::parse(&original.to_string()).unwrap().unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.repository(), "h.io/acme/widget");
        assert_eq!(parsed.revision(), Some("feature/x:y z"));
        assert_eq!(parsed.relative_path(), "src/deep/mod.rs");
    }

    #[test]
    fn test_empty_segments_are_normalized() {
        let uri = RepoUri::parse("repo://h.io/acme/widget//src//lib.rs").unwrap().unwrap();
        assert_eq!(uri.relative_path(), "src/lib.rs");
    }

    #[test]
    fn test_with_revision_switches_scheme() {
        let uri = RepoUri::for_repository("h.io/acme/widget", None).unwrap();
        let pinned = uri.with_revision(Some("abc123"));
        assert_eq!(pinned.scheme(), RepoScheme::RepoVersion);
        assert!(pinned.to_string().starts_with("repo+version://"));
        let unpinned = pinned.with_revision(None);
        assert_eq!(unpinned.scheme(), RepoScheme::Repo);
    }

    #[test]
    fn test_repository_root_keeps_revision() {
        let uri = RepoUri::parse("repo+version://h.io/acme/widget/src/lib.rs?abc")
            .unwrap()
            .unwrap();
        let root = uri.repository_root();
        assert_eq!(root.relative_path(), "");
        assert_eq!(root.revision(), Some("abc"));
    }
}
